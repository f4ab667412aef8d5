// SPDX-License-Identifier: GPL-3.0-only

//! mount(2) / umount(2) wrappers

use std::path::Path;

use enumflags2::BitFlags;
use nix::mount::{MsFlags, umount};
use tracing::debug;
use volume_types::MountFlag;

use crate::error::{Result, SysError};

/// Translate table flags to kernel mount flags.
pub fn ms_flags(flags: BitFlags<MountFlag>) -> MsFlags {
    let mut ms = MsFlags::empty();
    for flag in flags.iter() {
        ms |= match flag {
            MountFlag::ReadOnly => MsFlags::MS_RDONLY,
            MountFlag::NoSuid => MsFlags::MS_NOSUID,
            MountFlag::NoDev => MsFlags::MS_NODEV,
            MountFlag::NoExec => MsFlags::MS_NOEXEC,
            MountFlag::Synchronous => MsFlags::MS_SYNCHRONOUS,
            MountFlag::NoAtime => MsFlags::MS_NOATIME,
            MountFlag::NoDirAtime => MsFlags::MS_NODIRATIME,
            MountFlag::RelAtime => MsFlags::MS_RELATIME,
        };
    }
    ms
}

/// Mount `source` on `target`; an empty `data` passes no filesystem options.
pub fn mount(
    source: &str,
    target: &str,
    fs_type: &str,
    flags: BitFlags<MountFlag>,
    data: &str,
) -> Result<()> {
    debug!(
        "mount {} on {} type {} flags {:?} data {:?}",
        source, target, fs_type, flags, data
    );

    let data = (!data.is_empty()).then_some(data);
    nix::mount::mount(Some(source), target, Some(fs_type), ms_flags(flags), data)
        .map_err(|errno| SysError::errno("mount", format!("{source} on {target}"), errno))
}

pub fn unmount(target: &str) -> Result<()> {
    debug!("umount {}", target);
    umount(target).map_err(|errno| SysError::errno("umount", target, errno))
}

/// Existence check used before touching a device node.
pub fn node_exists(path: &str) -> bool {
    Path::new(path).exists()
}
