// SPDX-License-Identifier: GPL-3.0-only

//! Ensure-mounted / ensure-unmounted
//!
//! Both operations are idempotent: the live mount table is rescanned on
//! every call and no syscall is issued when the volume is already in the
//! requested state.

use tracing::{error, info, warn};
use volume_types::{
    BlkDeviceTemplate, FsType, MountFlag, MountedVolume, Result, TemplateShape, Volume,
    VolumeError, VolumeErrorKind,
};

use crate::backend::Backend;
use crate::engine::{self, engine_flags};
use crate::manager::VolumeManager;
use crate::prober;
use crate::retry::RetryPolicy;

impl<B: Backend> VolumeManager<'_, B> {
    /// Make sure the volume configured at `path` is mounted.
    pub fn ensure_mounted(&self, path: &str) -> Result<()> {
        let volume = self.table.lookup(path).inspect_err(|_| {
            error!("unknown volume for path [{}]", path);
        })?;

        if volume.fs_type == FsType::Ramdisk {
            // the ramdisk is always mounted
            return Ok(());
        }

        if self.find_mounted(volume)?.is_some() {
            return Ok(());
        }

        self.backend
            .create_dir(&volume.mount_point, self.policy.mount_point_mode)?;

        let result = match volume.fs_type {
            FsType::Yaffs2 | FsType::Mtd => self.mount_mtd(volume),
            FsType::Ext4 => self.mount_ext4(volume),
            FsType::Vfat | FsType::Auto => self.mount_fat_family(volume),
            FsType::Squashfs | FsType::F2fs => self.backend.mount(
                &volume.blk_device,
                &volume.mount_point,
                volume.fs_type.as_str(),
                volume.flags,
                &volume.fs_options,
            ),
            FsType::Ramdisk | FsType::Ntfs | FsType::Exfat => {
                error!(
                    "unknown fs_type \"{}\" for {}",
                    volume.fs_type, volume.mount_point
                );
                return Err(VolumeError::Unsupported(format!(
                    "mounting {} volumes",
                    volume.fs_type
                )));
            }
        };

        if let Err(e) = &result {
            error!("failed to mount {} ({})", volume.mount_point, e);
        }
        result
    }

    /// Make sure the volume configured at `path` is not mounted.
    pub fn ensure_unmounted(&self, path: &str) -> Result<()> {
        let volume = self.table.lookup(path).inspect_err(|_| {
            error!("unknown volume for path [{}]", path);
        })?;

        if volume.fs_type == FsType::Ramdisk {
            // the ramdisk is always mounted; you can't unmount it
            return Err(VolumeError::Unsupported(format!(
                "unmounting ramdisk {}",
                volume.mount_point
            )));
        }

        let Some(mounted) = self.find_mounted(volume)? else {
            return Ok(());
        };

        self.backend.unmount(&mounted.mount_point).inspect_err(|e| {
            error!("failed to unmount {} ({})", mounted.mount_point, e);
        })
    }

    fn find_mounted(&self, volume: &Volume) -> Result<Option<MountedVolume>> {
        let mounted = self.backend.mounted_volumes().inspect_err(|e| {
            error!("failed to scan mounted volumes: {}", e);
        })?;
        Ok(volume_sys::find_mounted_volume(&mounted, &volume.mount_point).cloned())
    }

    fn mount_mtd(&self, volume: &Volume) -> Result<()> {
        let partition = self
            .backend
            .find_mtd_partition(&volume.blk_device)?
            .ok_or_else(|| {
                error!(
                    "failed to find \"{}\" partition to mount at \"{}\"",
                    volume.blk_device, volume.mount_point
                );
                VolumeError::NotFound(format!("MTD partition {}", volume.blk_device))
            })?;

        self.backend.mount(
            &partition.block_device(),
            &volume.mount_point,
            FsType::Yaffs2.as_str(),
            engine_flags(),
            "",
        )
    }

    fn mount_ext4(&self, volume: &Volume) -> Result<()> {
        if volume.is_system(&self.policy.system_marker) {
            self.backend.mount(
                &volume.blk_device,
                &volume.mount_point,
                FsType::Ext4.as_str(),
                engine_flags() | MountFlag::ReadOnly,
                "",
            )
        } else {
            self.backend.mount(
                &volume.blk_device,
                &volume.mount_point,
                FsType::Ext4.as_str(),
                engine_flags(),
                "discard",
            )
        }
    }

    fn mount_fat_family(&self, volume: &Volume) -> Result<()> {
        if !volume.is_removable_media(&self.policy.removable_markers) {
            return self.mount_read_only(volume);
        }

        // Fail fast on a template that can never resolve.
        let templated = match BlkDeviceTemplate::classify(&volume.blk_device) {
            TemplateShape::Valid(_) => true,
            TemplateShape::NotApplicable => false,
            TemplateShape::Malformed(reason) => {
                error!("decompose blk_device error({}) in volume table", reason);
                return Err(VolumeError::MalformedConfig(reason));
            }
        };

        // Kernel enumeration of removable media may lag behind boot.
        let retry = RetryPolicy::from(self.policy.mount_poll);
        let device = retry.run(
            |interval| self.backend.sleep(interval),
            |e: &VolumeError| e.kind() != VolumeErrorKind::MalformedConfig,
            |_| {
                if templated {
                    prober::probe_and_mount(&self.backend, volume, self.policy.probe)
                } else {
                    engine::attempt_mount(&self.backend, &volume.blk_device, volume, true)
                        .map(|_| volume.blk_device.clone())
                }
            },
        );

        match device {
            Ok(device) => {
                info!("mounted {} on {}", device, volume.mount_point);
                Ok(())
            }
            Err(e) => {
                warn!(
                    "gave up on {} after {:?}",
                    volume.mount_point,
                    retry.total_wait()
                );
                Err(e)
            }
        }
    }

    /// Fixed (non-removable) FAT-family volume: read-only, no polling.
    fn mount_read_only(&self, volume: &Volume) -> Result<()> {
        let mut last_error = VolumeError::Unsupported(volume.fs_type.to_string());
        for &fs_type in engine::candidate_types(volume.fs_type) {
            match self.backend.mount(
                &volume.blk_device,
                &volume.mount_point,
                fs_type.as_str(),
                engine_flags() | MountFlag::ReadOnly,
                "",
            ) {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}
