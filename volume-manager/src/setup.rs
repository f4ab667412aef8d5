// SPDX-License-Identifier: GPL-3.0-only

//! Pre-install mount baseline

use tracing::{error, info, warn};
use volume_types::Result;

use crate::backend::Backend;
use crate::manager::VolumeManager;

impl<B: Backend> VolumeManager<'_, B> {
    /// Walk the table in order: scratch and cache end up mounted, every
    /// other volume ends up unmounted.
    ///
    /// The cache gets one format-and-retry when its first mount fails.
    pub fn setup_install_mounts(&self) -> Result<()> {
        let scratch = self.policy.scratch_mount_point.as_str();
        let cache = self.policy.cache_mount_point.as_str();

        for volume in self.table.iter() {
            let path = volume.mount_point.as_str();

            if path == scratch {
                self.ensure_mounted(path).inspect_err(|_| {
                    error!("failed to mount {}", path);
                })?;
            } else if path == cache {
                self.mount_cache(path)?;
            } else {
                self.ensure_unmounted(path).inspect_err(|_| {
                    error!("failed to unmount {}", path);
                })?;
            }
        }

        info!("install mount baseline established");
        Ok(())
    }

    fn mount_cache(&self, path: &str) -> Result<()> {
        if self.ensure_mounted(path).is_ok() {
            return Ok(());
        }

        warn!("failed to mount {}, formatting it", path);
        if let Err(e) = self.format(path) {
            warn!("format of {} failed: {}", path, e);
        }

        self.ensure_mounted(path).inspect_err(|_| {
            error!("failed to mount {} after format", path);
        })
    }
}
