// SPDX-License-Identifier: GPL-3.0-only

//! Volume descriptors
//!
//! A `Volume` is one row of the volume table: a mount point, the filesystem
//! it carries, the backing device and the parameters used to format it.

use std::fmt;
use std::str::FromStr;

use enumflags2::{BitFlags, bitflags};

use crate::error::VolumeError;

/// Sentinel `key_loc` value reserving a crypto footer at the end of the volume.
pub const KEY_LOC_FOOTER: &str = "footer";

/// Filesystem types a volume may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsType {
    /// Permanently mounted in-memory scratch space
    Ramdisk,

    /// YAFFS2 on a raw MTD partition
    Yaffs2,

    /// Raw MTD partition without a mountable filesystem
    Mtd,

    Ext4,
    Vfat,

    /// Probe vfat, ntfs and exfat in that order
    Auto,

    Ntfs,
    Exfat,
    Squashfs,
    F2fs,
}

impl FsType {
    /// Candidate types tried, in order, when a volume declares `auto`.
    pub const AUTO_CANDIDATES: [FsType; 3] = [FsType::Vfat, FsType::Ntfs, FsType::Exfat];

    /// Name understood by the kernel and the table source
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ramdisk => "ramdisk",
            Self::Yaffs2 => "yaffs2",
            Self::Mtd => "mtd",
            Self::Ext4 => "ext4",
            Self::Vfat => "vfat",
            Self::Auto => "auto",
            Self::Ntfs => "ntfs",
            Self::Exfat => "exfat",
            Self::Squashfs => "squashfs",
            Self::F2fs => "f2fs",
        }
    }
}

impl fmt::Display for FsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FsType {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ramdisk" => Ok(Self::Ramdisk),
            "yaffs2" => Ok(Self::Yaffs2),
            "mtd" => Ok(Self::Mtd),
            "ext4" => Ok(Self::Ext4),
            "vfat" => Ok(Self::Vfat),
            "auto" => Ok(Self::Auto),
            "ntfs" => Ok(Self::Ntfs),
            "exfat" => Ok(Self::Exfat),
            "squashfs" => Ok(Self::Squashfs),
            "f2fs" => Ok(Self::F2fs),
            other => Err(VolumeError::MalformedConfig(format!(
                "unknown fs_type \"{other}\""
            ))),
        }
    }
}

/// Generic mount flags a table entry may request
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountFlag {
    ReadOnly = 1 << 0,
    NoSuid = 1 << 1,
    NoDev = 1 << 2,
    NoExec = 1 << 3,
    Synchronous = 1 << 4,
    NoAtime = 1 << 5,
    NoDirAtime = 1 << 6,
    RelAtime = 1 << 7,
}

impl MountFlag {
    /// Parse a single table option; unknown options are not flags.
    pub fn parse(option: &str) -> Option<Self> {
        match option {
            "ro" => Some(Self::ReadOnly),
            "nosuid" => Some(Self::NoSuid),
            "nodev" => Some(Self::NoDev),
            "noexec" => Some(Self::NoExec),
            "sync" => Some(Self::Synchronous),
            "noatime" => Some(Self::NoAtime),
            "nodiratime" => Some(Self::NoDirAtime),
            "relatime" => Some(Self::RelAtime),
            _ => None,
        }
    }
}

/// Where a volume keeps its encryption metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLocation {
    /// Reserved region at the end of the volume itself
    Footer,

    /// Separate device node holding the crypto footer
    Device(String),

    /// Anything else the table declared; carried but not acted upon
    Other(String),
}

impl KeyLocation {
    pub fn parse(value: &str) -> Self {
        if value == KEY_LOC_FOOTER {
            Self::Footer
        } else if value.starts_with('/') {
            Self::Device(value.to_string())
        } else {
            Self::Other(value.to_string())
        }
    }
}

/// A configured mount point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    /// Unique key of the table
    pub mount_point: String,

    pub fs_type: FsType,

    /// Backing device, MTD partition name, or a two-marker template
    pub blk_device: String,

    /// 0 = whole device, > 0 = explicit byte length, < 0 = bytes reserved at the end
    pub length: i64,

    pub key_loc: Option<KeyLocation>,

    /// Flags applied by the direct-mount types (squashfs, f2fs)
    pub flags: BitFlags<MountFlag>,

    /// Filesystem-specific mount data, passed through untouched
    pub fs_options: String,
}

impl Volume {
    /// Build a volume with no flags, options or format parameters.
    pub fn new(mount_point: &str, fs_type: FsType, blk_device: &str) -> Self {
        Self {
            mount_point: mount_point.to_string(),
            fs_type,
            blk_device: blk_device.to_string(),
            length: 0,
            key_loc: None,
            flags: BitFlags::empty(),
            fs_options: String::new(),
        }
    }

    /// Heuristic: the mount point names hot-pluggable media.
    ///
    /// A mount point counts as removable when it contains any of `markers`
    /// (by default `sdcard` and `udisk`). This is a naming convention of the
    /// table, not a property of the hardware.
    pub fn is_removable_media<S: AsRef<str>>(&self, markers: &[S]) -> bool {
        markers
            .iter()
            .any(|marker| self.mount_point.contains(marker.as_ref()))
    }

    /// Heuristic: the mount point names the read-only system image.
    pub fn is_system(&self, marker: &str) -> bool {
        !marker.is_empty() && self.mount_point.contains(marker)
    }

    /// Byte length handed to the filesystem creator.
    ///
    /// An explicit `length` wins; otherwise a `footer` key location reserves
    /// `footer_offset` bytes at the end of the device (negative result).
    pub fn format_length(&self, footer_offset: u64) -> i64 {
        if self.length != 0 {
            self.length
        } else if self.key_loc == Some(KeyLocation::Footer) {
            -(footer_offset as i64)
        } else {
            0
        }
    }
}

/// One row of the live mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedVolume {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}
