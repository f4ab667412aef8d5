// SPDX-License-Identifier: GPL-3.0-only

//! Volume table registry
//!
//! Loaded once at startup and read-only afterwards; every operation borrows it.

use std::fs;

use tracing::{error, info};
use volume_types::{FsType, Policy, Result, Volume, VolumeError, parse_fstab};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeTable {
    volumes: Vec<Volume>,
}

impl VolumeTable {
    /// Read the table named by `policy` and add the scratch ramdisk.
    pub fn load(policy: &Policy) -> Result<Self> {
        let path = policy.fstab_path.display().to_string();
        let raw = fs::read_to_string(&policy.fstab_path).map_err(|e| {
            error!("failed to read {}: {}", path, e);
            VolumeError::NotFound(format!("volume table {path}"))
        })?;

        let volumes = parse_fstab(&raw).inspect_err(|e| {
            error!("failed to parse {}: {}", path, e);
        })?;

        let table = Self::with_scratch(volumes, &policy.scratch_mount_point)?;
        table.log_summary();
        Ok(table)
    }

    /// Build a table from parsed volumes, appending a ramdisk at `scratch`.
    pub fn with_scratch(mut volumes: Vec<Volume>, scratch: &str) -> Result<Self> {
        if volumes.iter().any(|volume| volume.mount_point == scratch) {
            error!("failed to add {} entry to volume table", scratch);
            return Err(VolumeError::MalformedConfig(format!(
                "{scratch} is reserved for the ramdisk"
            )));
        }

        volumes.push(Volume::new(scratch, FsType::Ramdisk, "ramdisk"));
        Ok(Self { volumes })
    }

    /// Exact mount-point match; no prefix matching.
    pub fn lookup(&self, path: &str) -> Result<&Volume> {
        self.volumes
            .iter()
            .find(|volume| volume.mount_point == path)
            .ok_or_else(|| VolumeError::NotFound(format!("volume for path {path}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Volume> {
        self.volumes.iter()
    }

    pub fn log_summary(&self) {
        info!("recovery filesystem table ({} volumes)", self.volumes.len());
        for (index, volume) in self.volumes.iter().enumerate() {
            info!(
                "  {} {} {} {} {}",
                index, volume.mount_point, volume.fs_type, volume.blk_device, volume.length
            );
        }
    }
}
