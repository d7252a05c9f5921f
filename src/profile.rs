// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The optional page-hit profiling hook (§9 "Profiling sidecar").
//!
//! The original driver bumps a per-node counter on every page fault,
//! behind its own proc-file exporter; both the counters and the
//! exporter are out of scope here (§1). What the core keeps is the
//! observation point itself, so a host that wants the counters can
//! supply one without the resolver's hot path knowing anything about
//! it.

/// Notified once per page resolution, with the inode and the
/// `array_idx` the resolver looked up. The default implementation
/// does nothing; it is not on the critical path for correctness.
pub trait PageObserver {
    fn on_page_access(&self, inode: u64, array_idx: u64);
}

/// An observer that records nothing.
pub struct NullObserver;

impl PageObserver for NullObserver {
    fn on_page_access(&self, _inode: u64, _array_idx: u64) {}
}
