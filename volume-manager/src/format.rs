// SPDX-License-Identifier: GPL-3.0-only

//! Volume formatting
//!
//! The volume is always unmounted first; a failed unmount aborts before any
//! destructive step.

use tracing::{error, info};
use volume_sys::tools::EXT4_BLOCK_SIZE;
use volume_types::{FsType, KeyLocation, Result, Volume, VolumeError};

use crate::backend::Backend;
use crate::manager::VolumeManager;

const F2FS_SECTOR_SIZE: i64 = 512;

impl<B: Backend> VolumeManager<'_, B> {
    /// Recreate the filesystem of the volume mounted at exactly `path`.
    pub fn format(&self, path: &str) -> Result<()> {
        let volume = self.table.lookup(path).inspect_err(|_| {
            error!("unknown volume for path [{}]", path);
        })?;

        if volume.fs_type == FsType::Ramdisk {
            error!("can't format_volume \"{}\"", path);
            return Err(VolumeError::Unsupported(format!("formatting ramdisk {path}")));
        }
        if volume.mount_point != path {
            error!("can't give path \"{}\" to format_volume", path);
            return Err(VolumeError::MalformedConfig(format!(
                "{path} is not the mount point of its volume"
            )));
        }

        if let Err(e) = self.ensure_unmounted(path) {
            error!("format_volume failed to unmount \"{}\"", volume.mount_point);
            return Err(e);
        }

        match volume.fs_type {
            FsType::Yaffs2 | FsType::Mtd => self.format_mtd(volume),
            FsType::Ext4 | FsType::F2fs => {
                if let Some(KeyLocation::Device(footer_device)) = &volume.key_loc {
                    self.backend.wipe_device(footer_device).inspect_err(|e| {
                        error!("failed to wipe crypto footer {}: {}", footer_device, e);
                    })?;
                }

                let length = volume.format_length(self.policy.crypt_footer_offset);
                if volume.fs_type == FsType::Ext4 {
                    self.format_ext4(volume, length)
                } else {
                    self.format_f2fs(volume, length)
                }
            }
            other => {
                error!("format_volume: fs_type \"{}\" unsupported", other);
                Err(VolumeError::Unsupported(format!("formatting {other} volumes")))
            }
        }
    }

    fn format_mtd(&self, volume: &Volume) -> Result<()> {
        let partition = self
            .backend
            .find_mtd_partition(&volume.blk_device)?
            .ok_or_else(|| {
                error!("format_volume: no MTD partition \"{}\"", volume.blk_device);
                VolumeError::NotFound(format!("MTD partition {}", volume.blk_device))
            })?;

        self.backend.erase_mtd_partition(&partition)?;
        info!("erased MTD partition \"{}\"", partition.name);
        Ok(())
    }

    fn format_ext4(&self, volume: &Volume, length: i64) -> Result<()> {
        let device = volume.blk_device.as_str();

        let blocks = match length {
            0 => None,
            n if n > 0 => Some(n.unsigned_abs() / EXT4_BLOCK_SIZE),
            n => {
                let size = self.backend.device_size(device)?;
                let reserved = n.unsigned_abs();
                if size <= reserved {
                    error!(
                        "{} is {} bytes, can't reserve {} bytes",
                        device, size, reserved
                    );
                    return Err(VolumeError::MalformedConfig(format!(
                        "length {n} exceeds size of {device}"
                    )));
                }
                Some((size - reserved) / EXT4_BLOCK_SIZE)
            }
        };

        self.backend.erase_volume(device).inspect_err(|e| {
            error!("format_volume: ext4 erase of {} failed: {}", device, e);
        })?;

        let label = volume.mount_point.rsplit('/').next().unwrap_or("");
        self.backend.make_ext4(device, blocks, label).inspect_err(|e| {
            error!("format_volume: make_ext4fs failed on {}: {}", device, e);
        })
    }

    fn format_f2fs(&self, volume: &Volume, length: i64) -> Result<()> {
        if length < 0 {
            error!("format_volume: negative length ({}) not supported on f2fs", length);
            return Err(VolumeError::Unsupported(format!(
                "negative length {length} on f2fs"
            )));
        }

        let sectors = (length / F2FS_SECTOR_SIZE).unsigned_abs();
        self.backend
            .make_f2fs(&volume.blk_device, sectors)
            .inspect_err(|e| {
                error!("format_volume: mkfs.f2fs failed on {}: {}", volume.blk_device, e);
            })
    }
}
