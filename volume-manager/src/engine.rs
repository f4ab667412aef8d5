// SPDX-License-Identifier: GPL-3.0-only

//! Single mount attempts
//!
//! One device node, one volume: try each candidate filesystem type in
//! order, read-write first, then read-only when the volume is removable
//! media. The first mount that succeeds wins.

use enumflags2::BitFlags;
use tracing::{error, warn};
use volume_types::{FsType, MountFlag, Result, Volume, VolumeError};

use crate::backend::Backend;

/// Flags of every engine mount; read-only fallback adds `ReadOnly`.
pub fn engine_flags() -> BitFlags<MountFlag> {
    MountFlag::NoAtime | MountFlag::NoDev | MountFlag::NoDirAtime
}

/// Filesystem types tried for `fs_type`, in order.
pub fn candidate_types(fs_type: FsType) -> &'static [FsType] {
    match fs_type {
        FsType::Auto => &FsType::AUTO_CANDIDATES,
        FsType::Vfat => &[FsType::Vfat],
        FsType::Ntfs => &[FsType::Ntfs],
        FsType::Exfat => &[FsType::Exfat],
        FsType::Ext4 => &[FsType::Ext4],
        FsType::F2fs => &[FsType::F2fs],
        FsType::Squashfs => &[FsType::Squashfs],
        FsType::Yaffs2 | FsType::Mtd => &[FsType::Yaffs2],
        FsType::Ramdisk => &[],
    }
}

/// Mount `device` at `volume.mount_point`; returns the type that mounted.
///
/// Never consults or changes the volume table. On failure the last OS
/// error is returned.
pub fn attempt_mount<B: Backend>(
    backend: &B,
    device: &str,
    volume: &Volume,
    removable: bool,
) -> Result<FsType> {
    if !backend.node_exists(device) {
        return Err(VolumeError::NotFound(format!("device node {device}")));
    }

    let mut last_error =
        VolumeError::Unsupported(format!("no mountable type for {}", volume.fs_type));

    for &fs_type in candidate_types(volume.fs_type) {
        match backend.mount(
            device,
            &volume.mount_point,
            fs_type.as_str(),
            engine_flags(),
            "",
        ) {
            Ok(()) => return Ok(fs_type),
            Err(e) => {
                if !removable {
                    last_error = e;
                    continue;
                }
                warn!(
                    "failed to mount {} on {} ({}). try read-only ...",
                    device, volume.mount_point, e
                );
            }
        }

        match backend.mount(
            device,
            &volume.mount_point,
            fs_type.as_str(),
            engine_flags() | MountFlag::ReadOnly,
            "",
        ) {
            Ok(()) => {
                warn!(
                    "mounted {} on {} read-only as {}",
                    device, volume.mount_point, fs_type
                );
                return Ok(fs_type);
            }
            Err(e) => {
                error!(
                    "failed to mount {} on {} read-only ({})",
                    device, volume.mount_point, e
                );
                last_error = e;
            }
        }
    }

    Err(last_error)
}
