// SPDX-License-Identifier: GPL-3.0-only

//! Volume manager policy
//!
//! Loaded from an optional TOML file; every key has a default so an absent
//! file yields the stock recovery behaviour.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolumeError};

pub const DEFAULT_POLICY_PATH: &str = "/etc/recovery-volumes.toml";

/// Reserved bytes at the end of a volume whose key location is `footer`.
pub const CRYPT_FOOTER_OFFSET: u64 = 0x4000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub fstab_path: PathBuf,
    /// Ramdisk entry injected into every table
    pub scratch_mount_point: String,
    /// Volume that is formatted and retried once during install setup
    pub cache_mount_point: String,
    pub removable_markers: Vec<String>,
    pub system_marker: String,
    pub crypt_footer_offset: u64,
    pub mount_point_mode: u32,
    pub probe: ProbePolicy,
    pub mount_poll: MountPollPolicy,
    pub tools: ToolPaths,
    pub instaboot: InstabootPolicy,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            fstab_path: PathBuf::from("/etc/recovery.fstab"),
            scratch_mount_point: "/tmp".to_string(),
            cache_mount_point: "/cache".to_string(),
            removable_markers: vec!["sdcard".to_string(), "udisk".to_string()],
            system_marker: "system".to_string(),
            crypt_footer_offset: CRYPT_FOOTER_OFFSET,
            mount_point_mode: 0o755,
            probe: ProbePolicy::default(),
            mount_poll: MountPollPolicy::default(),
            tools: ToolPaths::default(),
            instaboot: InstabootPolicy::default(),
        }
    }
}

/// Bounds of removable-media enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbePolicy {
    /// Device instances tried per template
    pub devices: usize,
    /// Partition numbers tried per instance, starting at 1
    pub partitions: u32,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            devices: 3,
            partitions: 6,
        }
    }
}

/// Polling applied while removable media are still being enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountPollPolicy {
    pub interval_ms: u64,
    pub deadline_us: u64,
}

impl Default for MountPollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            deadline_us: 2_000_000,
        }
    }
}

impl MountPollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_micros(self.deadline_us)
    }
}

/// External filesystem-creation tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub mkfs_f2fs: PathBuf,
    /// Looked up in `PATH` when not absolute
    pub mkfs_ext4: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            mkfs_f2fs: PathBuf::from("/sbin/mkfs.f2fs"),
            mkfs_ext4: PathBuf::from("mke2fs"),
        }
    }
}

/// Fast-boot hibernation image and its enable property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstabootPolicy {
    /// Swap device whose leading region holds the image header
    pub device: String,
    pub clear_chunk_size: usize,
    pub clear_chunks: usize,
    /// Volume holding the persisted property
    pub data_mount_point: String,
    pub enable_flag: PathBuf,
}

impl Default for InstabootPolicy {
    fn default() -> Self {
        Self {
            device: "/dev/block/instaboot".to_string(),
            clear_chunk_size: 2048,
            clear_chunks: 8,
            data_mount_point: "/data".to_string(),
            enable_flag: PathBuf::from("/data/property/persist.sys.instaboot.enable"),
        }
    }
}

impl Policy {
    /// Load the policy at `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|error| {
            VolumeError::MalformedConfig(format!("{}: {error}", path.display()))
        })?;
        let policy: Policy = toml::from_str(&raw).map_err(|error| {
            VolumeError::MalformedConfig(format!("{}: {error}", path.display()))
        })?;

        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe.devices == 0 || self.probe.partitions == 0 {
            return Err(VolumeError::MalformedConfig(
                "probe.devices and probe.partitions must be positive".to_string(),
            ));
        }

        // USB instances are lettered a..z.
        if self.probe.devices > 26 {
            return Err(VolumeError::MalformedConfig(format!(
                "probe.devices = {} exceeds the 26 enumerable instances",
                self.probe.devices
            )));
        }

        if self.mount_poll.interval_ms == 0 {
            return Err(VolumeError::MalformedConfig(
                "mount_poll.interval_ms must be positive".to_string(),
            ));
        }

        if !self.scratch_mount_point.starts_with('/') || !self.cache_mount_point.starts_with('/')
        {
            return Err(VolumeError::MalformedConfig(
                "scratch and cache mount points must be absolute".to_string(),
            ));
        }

        Ok(())
    }
}
