// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for recovery volumes
//!
//! This crate provides direct system call interfaces with no policy of
//! their own:
//! - mount/umount and the live mount table
//! - MTD partition scan, open and erase
//! - Block device size queries, discard and zero-fill
//! - External filesystem-creation tools
//!
//! These operations require elevated privileges and are driven by the
//! volume manager.

pub mod error;
pub mod mount;
pub mod mounts;
pub mod mtd;
pub mod tools;
pub mod wipe;

pub use error::{Result, SysError};
pub use mount::{mount, node_exists, unmount};
pub use mounts::{find_mounted_volume, parse_mountinfo, scan_mounted_volumes};
pub use mtd::{MtdPartition, MtdWriter, find_partition_by_name, scan_partitions};
pub use tools::{make_ext4, make_f2fs};
pub use wipe::{device_size, discard_device, open_for_wipe, zero_chunks, zero_fill};
