// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The abstract storage backend the core reads bytes from.
//!
//! An AXFS image occupies a single logical address space `[0, size)`.
//! The prefix `[0, mmap_size)` is backed by a memory window (a flash
//! mapping, a remapped physical range, or simply an in-memory image);
//! the remainder, if any, lives on a block device and is fetched a
//! block at a time. Enumerating flash devices, physical memory, and
//! block devices themselves is external to the core (§2, "OS
//! bridges"); this module only combines whatever the caller already
//! opened into one addressable range.

use crate::result::{Error, Result};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

/// A handle onto a block device, used to serve the part of the image
/// that lies beyond the mapped window.
///
/// `read_block` always fills a full `block_size()`-sized buffer;
/// trimming a partial read at the tail of the image is the caller's
/// job, mirroring the Linux driver's use of `sb_bread`, which always
/// returns a full buffer head regardless of how much of it the
/// caller actually wants.
pub trait BlockDevice {
    /// The device's block size, in bytes. Must evenly divide the
    /// portion of the image that lives on this device.
    fn block_size(&self) -> usize;

    /// Reads the block at the given zero-based block index into
    /// `dst`, which is exactly `block_size()` bytes long.
    fn read_block(&self, index: u64, dst: &mut [u8]) -> Result<()>;
}

/// A byte-range reader over the unified AXFS address space.
///
/// Addresses below `mmap_size` are served from `window`, a slice
/// (zero-copy read); addresses at or above `mmap_size` are served
/// from `tail`, fetched a block at a time. A request that straddles
/// the boundary is split and the two halves are concatenated. If
/// `window` is absent entirely (no physical or virtual mapping was
/// established for the image), every read goes to `tail`, addressed
/// from its own offset zero.
pub struct Backend<'a> {
    window: Option<&'a [u8]>,
    tail: Option<Box<dyn BlockDevice + 'a>>,
    mmap_size: u64,
    size: u64,
}

impl<'a> Backend<'a> {
    /// Returns a backend over an image that is entirely resident in
    /// memory: no block tail, `mmap_size == size`.
    pub fn from_slice(image: &'a [u8]) -> Backend<'a> {
        Backend {
            window: Some(image),
            tail: None,
            mmap_size: image.len() as u64,
            size: image.len() as u64,
        }
    }

    /// Returns a backend over an image with a mapped prefix followed
    /// by a block device tail. `window.len()` must equal `mmap_size`
    /// unless `window` is empty, in which case the entire image is
    /// served from `tail` starting at logical offset 0.
    pub fn new(
        window: Option<&'a [u8]>,
        tail: Option<Box<dyn BlockDevice + 'a>>,
        mmap_size: u64,
        size: u64,
    ) -> Backend<'a> {
        Backend { window, tail, mmap_size, size }
    }

    /// The total logical size of the image.
    pub fn len(&self) -> u64 {
        self.size
    }

    /// The size of the memory-mapped prefix of the image.
    pub fn mmap_size(&self) -> u64 {
        self.mmap_size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the offset, relative to the start of the block
    /// device, at which the given file-system offset lives, per the
    /// mixed-layout rule: if no memory window exists at all, the
    /// block device is addressed directly by `fsoffset`; otherwise
    /// it is addressed relative to the end of the mapped window.
    fn block_offset(&self, fsoffset: u64) -> u64 {
        if self.window.is_none() {
            fsoffset
        } else {
            fsoffset - self.mmap_size
        }
    }

    /// Returns a zero-copy slice of the mapped window, if the
    /// requested range lies entirely within it.
    pub fn window_slice(&self, offset: u64, len: u64) -> Option<&'a [u8]> {
        let window = self.window?;
        if offset + len > self.mmap_size {
            return None;
        }
        window.get(offset as usize..(offset + len) as usize)
    }

    /// Reads `len` bytes at `offset` from the block tail into `dst`.
    fn read_tail(&self, offset: u64, dst: &mut [u8]) -> Result<()> {
        let tail = self.tail.as_ref().ok_or(Error::CorruptRegion)?;
        let bs = tail.block_size() as u64;
        let mut done = 0u64;
        let mut block_buf = vec![0u8; bs as usize];
        while done < dst.len() as u64 {
            let pos = offset + done;
            let block = pos / bs;
            let in_block = (pos % bs) as usize;
            tail.read_block(block, &mut block_buf)?;
            let want = dst.len() as u64 - done;
            let avail = bs as usize - in_block;
            let take = core::cmp::min(want as usize, avail);
            dst[done as usize..done as usize + take]
                .copy_from_slice(&block_buf[in_block..in_block + take]);
            done += take as u64;
        }
        Ok(())
    }

    /// Copies `len` bytes starting at logical offset `offset` into
    /// `dst`, splitting across the mmap/block boundary as needed.
    pub fn copy_into(
        &self,
        offset: u64,
        len: u64,
        dst: &mut [u8],
    ) -> Result<()> {
        if offset + len > self.size {
            return Err(Error::CorruptIndex);
        }
        if dst.len() as u64 != len {
            return Err(Error::CorruptRegion);
        }
        if len == 0 {
            return Ok(());
        }
        let end = offset + len;
        if let Some(window) = self.window {
            if end <= self.mmap_size {
                let w = &window
                    [offset as usize..end as usize];
                dst.copy_from_slice(w);
                return Ok(());
            }
            if offset < self.mmap_size {
                let mapped_len = (self.mmap_size - offset) as usize;
                dst[..mapped_len].copy_from_slice(
                    &window[offset as usize..self.mmap_size as usize],
                );
                let boffset = self.block_offset(self.mmap_size);
                self.read_tail(boffset, &mut dst[mapped_len..])?;
                return Ok(());
            }
        }
        let boffset = self.block_offset(offset);
        self.read_tail(boffset, dst)
    }

    /// Allocates a buffer and fetches `len` bytes starting at
    /// logical offset `offset`.
    pub fn fetch(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len as usize];
        self.copy_into(offset, len, &mut buf)?;
        Ok(buf)
    }
}
