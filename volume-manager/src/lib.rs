// SPDX-License-Identifier: GPL-3.0-only

//! Recovery volume manager
//!
//! Makes the mount state of the volumes in a recovery volume table match
//! what an install needs:
//!
//! - [`VolumeTable`]: load-once registry of configured mount points
//! - [`prober`]: resolves removable-media templates to a device node that mounts
//! - [`engine`]: single mount attempts with type auto-detection and read-only fallback
//! - [`VolumeManager`]: idempotent ensure-mounted / ensure-unmounted, format,
//!   install setup and the one-shot instaboot housekeeping
//!
//! All operations are synchronous and go through a [`Backend`], so the policy
//! can be exercised without touching real devices.

pub mod backend;
pub mod engine;
pub mod format;
pub mod instaboot;
pub mod manager;
pub mod orchestrator;
pub mod prober;
pub mod retry;
pub mod setup;
pub mod table;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Backend, SystemBackend};
pub use instaboot::OneShotOutcome;
pub use manager::VolumeManager;
pub use retry::RetryPolicy;
pub use table::VolumeTable;
