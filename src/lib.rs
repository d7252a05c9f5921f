// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A reader for the Advanced XIP File System (AXFS) image format: a
//! read-only, compressed, execute-in-place-capable filesystem image.
//!
//! This crate parses the on-media layout, resolves file and directory
//! lookups against it, and serves page reads through one of three
//! transport paths (XIP, byte-aligned, or DEFLATE-compressed) without
//! requiring an operating system's VFS layer. Mounting the result
//! into a host filesystem, enumerating backing stores, and exporting
//! page-hit profiling data are all left to the caller; see
//! [`Backend`] and [`profile::PageObserver`] for the seams.
#![cfg_attr(not(any(test, clippy)), no_std)]

extern crate alloc;

mod backend;
mod cache;
mod image;
mod inflate;
mod metadata;
mod mode;
mod profile;
mod region;
mod resolver;
mod result;
mod stitch;
mod superblock;

pub use backend::{Backend, BlockDevice};
pub use image::Image;
pub use mode::{FileType, Mode};
pub use profile::{NullObserver, PageObserver};
pub use resolver::PageSource;
pub use result::{Error, Result};
pub use superblock::SuperBlock;
