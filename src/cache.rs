// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The single-slot compressed-block cache (§4.5, §5).
//!
//! Every cblock fetch takes the write side of the lock first, checks
//! whether the slot already holds the wanted cblock, fills it if not,
//! then downgrades to a reader before copying bytes out. Upgrading a
//! read lock is never attempted, which is what rules out writer
//! starvation: a caller either already owns the write side or takes
//! it fresh, it never waits while holding a read lock.

use crate::backend::Backend;
use crate::metadata::Metadata;
use crate::result::{Error, Result};
use alloc::vec;
use alloc::vec::Vec;
use spin::RwLock;

struct CacheState {
    current: Option<u64>,
    buffer: Vec<u8>,
    valid_len: usize,
}

/// The cblock cache. One instance per open `Image`.
pub struct CblockCache {
    state: RwLock<CacheState>,
}

impl CblockCache {
    pub fn new(cblock_size: usize) -> CblockCache {
        CblockCache {
            state: RwLock::new(CacheState {
                current: None,
                buffer: vec![0u8; cblock_size],
                valid_len: 0,
            }),
        }
    }

    /// The cnode index currently resident in the cache slot, if any.
    pub fn current_cnode(&self) -> Option<u64> {
        self.state.read().current
    }

    /// Copies up to `dst.len()` bytes starting at `inner_offset`
    /// within the decompressed form of cblock `k` into `dst`,
    /// filling the cache slot first if it does not already hold `k`.
    /// Returns the number of bytes copied, which may be fewer than
    /// `dst.len()` if the cblock (necessarily the image's last) has
    /// fewer than `cblock_size` bytes of plaintext beyond
    /// `inner_offset`.
    pub fn read_into(
        &self,
        metadata: &Metadata,
        backend: &Backend,
        k: u64,
        inner_offset: u64,
        dst: &mut [u8],
    ) -> Result<usize> {
        let mut guard = self.state.write();
        if guard.current != Some(k) {
            let off = metadata.cblock_offset(k)?;
            let next = metadata.cblock_offset(k + 1)?;
            let len = next.checked_sub(off).ok_or(Error::CorruptRegion)?;
            let compressed =
                metadata.compressed_region().read(backend, off, len);
            let fill_result = compressed.and_then(|bytes| {
                crate::inflate::inflate(&bytes, &mut guard.buffer)
            });
            match fill_result {
                Ok(n) => {
                    guard.valid_len = n;
                    guard.current = Some(k);
                }
                Err(e) => {
                    guard.current = None;
                    return Err(e);
                }
            }
        }

        let guard = guard.downgrade();
        let inner = inner_offset as usize;
        let avail = guard.valid_len.checked_sub(inner).ok_or(Error::CorruptIndex)?;
        let take = core::cmp::min(avail, dst.len());
        dst[..take].copy_from_slice(&guard.buffer[inner..inner + take]);
        Ok(take)
    }
}
