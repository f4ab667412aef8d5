// SPDX-License-Identifier: GPL-3.0-only

//! External filesystem-creation tools
//!
//! Tools run synchronously; only the exit status is observed.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};
use which::which;

use crate::error::{Result, SysError};

/// Block size passed to mke2fs.
pub const EXT4_BLOCK_SIZE: u64 = 4096;

fn resolve(tool: &Path) -> Result<PathBuf> {
    if tool.is_absolute() {
        if tool.exists() {
            return Ok(tool.to_path_buf());
        }
        return Err(SysError::ToolNotFound(tool.display().to_string()));
    }
    which(tool).map_err(|_| SysError::ToolNotFound(tool.display().to_string()))
}

fn run(tool: &Path, args: &[String]) -> Result<()> {
    let binary = resolve(tool)?;
    debug!("running {} {}", binary.display(), args.join(" "));

    let output = Command::new(&binary).args(args).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("{} failed: {}", binary.display(), stderr.trim());
        return Err(SysError::ToolFailed {
            tool: binary.display().to_string(),
            status: output.status.to_string(),
        });
    }
    Ok(())
}

/// Argument vector for `mkfs.f2fs -t -d1 <device> <sectors>`.
pub fn f2fs_args(device: &str, sectors: u64) -> Vec<String> {
    vec![
        "-t".to_string(),
        "-d1".to_string(),
        device.to_string(),
        sectors.to_string(),
    ]
}

/// Argument vector for `mke2fs -t ext4 -F -b 4096 -L <label> <device> [blocks]`.
pub fn ext4_args(device: &str, blocks: Option<u64>, label: &str) -> Vec<String> {
    let mut args = vec![
        "-t".to_string(),
        "ext4".to_string(),
        "-F".to_string(),
        "-b".to_string(),
        EXT4_BLOCK_SIZE.to_string(),
    ];
    if !label.is_empty() {
        args.push("-L".to_string());
        args.push(label.to_string());
    }
    args.push(device.to_string());
    if let Some(blocks) = blocks {
        args.push(blocks.to_string());
    }
    args
}

pub fn make_f2fs(tool: &Path, device: &str, sectors: u64) -> Result<()> {
    run(tool, &f2fs_args(device, sectors))
}

/// Create an ext4 filesystem; `blocks = None` fills the device.
pub fn make_ext4(tool: &Path, device: &str, blocks: Option<u64>, label: &str) -> Result<()> {
    run(tool, &ext4_args(device, blocks, label))
}
