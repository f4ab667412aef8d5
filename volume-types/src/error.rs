// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure categories reported by every volume operation.
///
/// Only the category crosses an operation boundary; the detail carried by
/// [`VolumeError`] is meant for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeErrorKind {
    NotFound,
    MalformedConfig,
    SyscallFailure,
    ToolFailure,
    Unsupported,
}

impl VolumeErrorKind {
    /// Process exit status used by the command-line front end.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::NotFound => 2,
            Self::MalformedConfig => 3,
            Self::SyscallFailure => 4,
            Self::ToolFailure => 5,
            Self::Unsupported => 6,
        }
    }
}

/// Error type for volume operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VolumeError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed configuration: {0}")]
    MalformedConfig(String),

    #[error("{op} failed on {target}: {reason}")]
    Syscall {
        op: &'static str,
        target: String,
        reason: String,
    },

    #[error("{tool} failed: {reason}")]
    Tool { tool: String, reason: String },

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl VolumeError {
    pub fn syscall(op: &'static str, target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Syscall {
            op,
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> VolumeErrorKind {
        match self {
            Self::NotFound(_) => VolumeErrorKind::NotFound,
            Self::MalformedConfig(_) => VolumeErrorKind::MalformedConfig,
            Self::Syscall { .. } => VolumeErrorKind::SyscallFailure,
            Self::Tool { .. } => VolumeErrorKind::ToolFailure,
            Self::Unsupported(_) => VolumeErrorKind::Unsupported,
        }
    }
}

/// Result type alias for volume operations
pub type Result<T> = std::result::Result<T, VolumeError>;
