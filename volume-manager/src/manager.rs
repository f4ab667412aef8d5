// SPDX-License-Identifier: GPL-3.0-only

use std::cell::Cell;

use volume_types::Policy;

use crate::backend::Backend;
use crate::table::VolumeTable;

/// Entry point for every volume operation
///
/// Borrows the loaded table and policy; the operations themselves are
/// implemented in [`crate::orchestrator`], [`crate::format`],
/// [`crate::setup`] and [`crate::instaboot`].
pub struct VolumeManager<'a, B: Backend> {
    pub(crate) table: &'a VolumeTable,
    pub(crate) policy: &'a Policy,
    pub(crate) backend: B,
    /// One-shot operations already carried out by this manager
    pub(crate) instaboot_cleared: Cell<bool>,
    pub(crate) instaboot_disabled: Cell<bool>,
}

impl<'a, B: Backend> VolumeManager<'a, B> {
    pub fn new(table: &'a VolumeTable, policy: &'a Policy, backend: B) -> Self {
        Self {
            table,
            policy,
            backend,
            instaboot_cleared: Cell::new(false),
            instaboot_disabled: Cell::new(false),
        }
    }
}
