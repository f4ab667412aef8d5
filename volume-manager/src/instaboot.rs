// SPDX-License-Identifier: GPL-3.0-only

//! Instaboot (fast-boot hibernation) housekeeping
//!
//! Both operations run at most once per manager. A repeated call reports
//! [`OneShotOutcome::AlreadyDone`] and touches nothing.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::manager::VolumeManager;

/// Pause after the header region is cleared.
const CLEAR_SETTLE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneShotOutcome {
    Completed,
    AlreadyDone,
    /// The target was unavailable; a later call tries again.
    Skipped,
}

impl<B: Backend> VolumeManager<'_, B> {
    /// Zero the header region of the instaboot swap device.
    pub fn instaboot_clear(&self) -> OneShotOutcome {
        if self.instaboot_cleared.get() {
            return OneShotOutcome::AlreadyDone;
        }

        let instaboot = &self.policy.instaboot;
        match self.backend.zero_chunks(
            &instaboot.device,
            instaboot.clear_chunk_size,
            instaboot.clear_chunks,
        ) {
            Ok(failed) => {
                if failed > 0 {
                    error!(
                        "instaboot: {} of {} writes to {} failed",
                        failed, instaboot.clear_chunks, instaboot.device
                    );
                }
                self.backend.sleep(CLEAR_SETTLE);
                self.instaboot_cleared.set(true);
                info!("instaboot: cleared {}", instaboot.device);
                OneShotOutcome::Completed
            }
            Err(e) => {
                warn!("instaboot: cannot open device {} ({})", instaboot.device, e);
                OneShotOutcome::Skipped
            }
        }
    }

    /// Remove the persisted enable property from the data volume.
    ///
    /// The data volume is mounted for the removal and unmounted again;
    /// failures along the way are logged and the operation still counts
    /// as done.
    pub fn instaboot_disable(&self) -> OneShotOutcome {
        if self.instaboot_disabled.get() {
            return OneShotOutcome::AlreadyDone;
        }

        let instaboot = &self.policy.instaboot;
        let data = instaboot.data_mount_point.as_str();

        match self.ensure_mounted(data) {
            Ok(()) => match self.backend.remove_file(&instaboot.enable_flag) {
                Ok(()) => info!("instaboot: removed {}", instaboot.enable_flag.display()),
                Err(e) => debug!(
                    "instaboot: {} not removed ({})",
                    instaboot.enable_flag.display(),
                    e
                ),
            },
            Err(e) => warn!("instaboot: can't mount {} ({})", data, e),
        }

        if let Err(e) = self.ensure_unmounted(data) {
            warn!("instaboot: can't unmount {} ({})", data, e);
        }

        self.instaboot_disabled.set(true);
        OneShotOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use volume_types::{FsType, Policy, Volume, VolumeError};

    use super::*;
    use crate::table::VolumeTable;
    use crate::testing::{Call, FakeBackend};

    fn table() -> VolumeTable {
        VolumeTable::with_scratch(
            vec![Volume::new("/data", FsType::Ext4, "/dev/block/by-name/userdata")],
            "/tmp",
        )
        .expect("table")
    }

    fn flag() -> PathBuf {
        PathBuf::from("/data/property/persist.sys.instaboot.enable")
    }

    #[test]
    fn clear_zeroes_header_once() {
        let table = table();
        let policy = Policy::default();
        let backend = FakeBackend::default();
        backend.add_node("/dev/block/instaboot");
        let manager = VolumeManager::new(&table, &policy, backend.clone());

        assert_eq!(manager.instaboot_clear(), OneShotOutcome::Completed);
        assert_eq!(
            backend.take_calls(),
            vec![
                Call::ZeroChunks {
                    device: "/dev/block/instaboot".to_string(),
                    chunk_size: 2048,
                    chunks: 8,
                },
                Call::Sleep(Duration::from_millis(10)),
            ]
        );

        assert_eq!(manager.instaboot_clear(), OneShotOutcome::AlreadyDone);
        assert!(backend.take_calls().is_empty());
    }

    #[test]
    fn clear_counts_as_done_despite_failed_writes() {
        let table = table();
        let policy = Policy::default();
        let backend = FakeBackend::default();
        backend.add_node("/dev/block/instaboot");
        backend.set_failed_chunk_writes(3);
        let manager = VolumeManager::new(&table, &policy, backend);

        assert_eq!(manager.instaboot_clear(), OneShotOutcome::Completed);
        assert_eq!(manager.instaboot_clear(), OneShotOutcome::AlreadyDone);
    }

    #[test]
    fn clear_without_device_is_retried_later() {
        let table = table();
        let policy = Policy::default();
        let backend = FakeBackend::default();
        let manager = VolumeManager::new(&table, &policy, backend.clone());

        assert_eq!(manager.instaboot_clear(), OneShotOutcome::Skipped);
        assert!(!backend.take_calls().iter().any(|c| matches!(c, Call::Sleep(_))));

        backend.add_node("/dev/block/instaboot");
        assert_eq!(manager.instaboot_clear(), OneShotOutcome::Completed);
    }

    #[test]
    fn disable_removes_flag_with_data_mounted_then_unmounts() {
        let table = table();
        let policy = Policy::default();
        let backend = FakeBackend::default();
        backend.allow_mount(None, None, None);
        let manager = VolumeManager::new(&table, &policy, backend.clone());

        assert_eq!(manager.instaboot_disable(), OneShotOutcome::Completed);
        assert!(!backend.is_mounted("/data"));

        let calls = backend.take_calls();
        let mount = calls
            .iter()
            .position(|c| matches!(c, Call::Mount { target, .. } if target == "/data"))
            .expect("data mounted");
        let remove = calls
            .iter()
            .position(|c| *c == Call::RemoveFile(flag()))
            .expect("flag removed");
        let unmount = calls
            .iter()
            .position(|c| *c == Call::Unmount("/data".to_string()))
            .expect("data unmounted");
        assert!(mount < remove && remove < unmount);

        assert_eq!(manager.instaboot_disable(), OneShotOutcome::AlreadyDone);
        assert!(backend.take_calls().is_empty());
    }

    #[test]
    fn disable_skips_removal_when_data_does_not_mount() {
        let table = table();
        let policy = Policy::default();
        let backend = FakeBackend::default();
        let manager = VolumeManager::new(&table, &policy, backend.clone());

        assert_eq!(manager.instaboot_disable(), OneShotOutcome::Completed);
        assert!(!backend.take_calls().contains(&Call::RemoveFile(flag())));
        assert_eq!(manager.instaboot_disable(), OneShotOutcome::AlreadyDone);
    }

    #[test]
    fn disable_tolerates_missing_flag() {
        let table = table();
        let policy = Policy::default();
        let backend = FakeBackend::default();
        backend.allow_mount(None, None, None);
        backend.set_remove_result(Err(VolumeError::syscall(
            "unlink",
            "/data/property/persist.sys.instaboot.enable",
            "No such file or directory",
        )));
        let manager = VolumeManager::new(&table, &policy, backend.clone());

        assert_eq!(manager.instaboot_disable(), OneShotOutcome::Completed);
        assert!(!backend.is_mounted("/data"));
    }
}
