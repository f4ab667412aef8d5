// SPDX-License-Identifier: GPL-3.0-only

use nix::errno::Errno;
use thiserror::Error;
use volume_types::VolumeError;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{op} failed on {target}: {errno}")]
    Errno {
        op: &'static str,
        target: String,
        errno: Errno,
    },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("invalid mountinfo line: {0}")]
    InvalidMountInfoLine(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("{tool} exited with {status}")]
    ToolFailed { tool: String, status: String },
}

impl SysError {
    pub(crate) fn errno(op: &'static str, target: impl Into<String>, errno: Errno) -> Self {
        Self::Errno {
            op,
            target: target.into(),
            errno,
        }
    }
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;

impl From<SysError> for VolumeError {
    fn from(err: SysError) -> Self {
        match err {
            SysError::Errno { op, target, errno } => VolumeError::syscall(op, target, errno.desc()),
            SysError::Io(e) => VolumeError::syscall("io", "", e),
            SysError::DeviceNotFound(device) => VolumeError::NotFound(device),
            SysError::InvalidMountInfoLine(line) => {
                VolumeError::syscall("scan mounts", "/proc/self/mountinfo", line)
            }
            SysError::ToolNotFound(tool) => VolumeError::Tool {
                tool,
                reason: "not found".to_string(),
            },
            SysError::ToolFailed { tool, status } => VolumeError::Tool {
                tool,
                reason: status,
            },
        }
    }
}
