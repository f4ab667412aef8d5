// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the recovery volume manager
//!
//! This crate defines the types shared by the low-level system crate and
//! the volume manager itself:
//!
//! - **volume-sys**: consumes `MountFlag` sets and returns `MountedVolume` snapshots
//! - **volume-manager**: owns the table of `Volume`s and reports `VolumeError`s
//!
//! ## Layout
//!
//! - `Volume` → one configured mount point, loaded once from the table source
//! - `BlkDeviceTemplate` → a removable-media device name with enumeration markers
//! - `MountedVolume` → one row of a live mount-table snapshot
//! - `Policy` → retry counts, intervals and tool paths, loaded from TOML

pub mod error;
pub mod fstab;
pub mod policy;
pub mod template;
pub mod volume;

pub use error::{Result, VolumeError, VolumeErrorKind};
pub use fstab::parse_fstab;
pub use policy::{InstabootPolicy, MountPollPolicy, Policy, ProbePolicy, ToolPaths};
pub use template::{BlkDeviceTemplate, Candidate, DeviceClass, PLACEHOLDER, TemplateShape};
pub use volume::{FsType, KeyLocation, MountFlag, MountedVolume, Volume};
