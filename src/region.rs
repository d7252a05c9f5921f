// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On-media region descriptors and the logic that loads them into
//! one of three in-core representations: a zero-copy slice into the
//! mapped window (XIP-capable), an owned decompressed/copied buffer,
//! or nothing at all (later accesses go straight to the backend).

use crate::backend::Backend;
use crate::result::{Error, Result};
use alloc::vec;
use alloc::vec::Vec;

/// Size, in bytes, of one `axfs_region_desc_onmedia` record (§6.2):
/// two u64s... six fields, the last two single bytes.
pub const REGION_DESC_SIZE: usize = 8 * 4 + 1 + 1;

/// The on-media region descriptor, decoded from big-endian fields.
#[derive(Clone, Copy, Debug)]
pub struct RegionDescOnMedia {
    pub fsoffset: u64,
    pub size: u64,
    pub compressed_size: u64,
    pub max_index: u64,
    pub table_byte_depth: u8,
    pub incore: u8,
}

impl RegionDescOnMedia {
    /// Parses a region descriptor out of its big-endian on-media
    /// representation.
    pub fn parse(bytes: &[u8]) -> Result<RegionDescOnMedia> {
        if bytes.len() < REGION_DESC_SIZE {
            return Err(Error::CorruptRegion);
        }
        let u64_at = |off: usize| {
            u64::from_be_bytes(bytes[off..off + 8].try_into().unwrap())
        };
        Ok(RegionDescOnMedia {
            fsoffset: u64_at(0),
            size: u64_at(8),
            compressed_size: u64_at(16),
            max_index: u64_at(24),
            table_byte_depth: bytes[32],
            incore: bytes[33],
        })
    }

    /// A region is compressed iff it occupies fewer bytes on media
    /// than its decoded size.
    pub fn is_compressed(&self) -> bool {
        self.compressed_size > 0
    }

    /// A region is XIP-eligible iff it is not compressed, not marked
    /// `incore`, and fits entirely within the mapped window.
    pub fn is_xip_eligible(&self, mmap_size: u64) -> bool {
        !self.is_compressed()
            && self.incore == 0
            && self.fsoffset + self.size <= mmap_size
    }
}

/// The loaded, in-core representation of a region: either a
/// zero-copy slice into the backend's mapped window, an owned
/// buffer, or nothing (accessed lazily through the backend on every
/// read).
pub enum RegionData<'a> {
    Mapped(&'a [u8]),
    Owned(Vec<u8>),
    Lazy,
}

/// A fully materialized region: its descriptor plus its loaded data.
pub struct Region<'a> {
    pub desc: RegionDescOnMedia,
    pub data: RegionData<'a>,
}

impl<'a> Region<'a> {
    /// Returns the bytes of this region if they are resident in
    /// memory (mapped or owned); `None` if the region must be
    /// fetched lazily from the backend.
    pub fn as_slice(&self) -> Option<&[u8]> {
        match &self.data {
            RegionData::Mapped(s) => Some(s),
            RegionData::Owned(v) => Some(v.as_slice()),
            RegionData::Lazy => None,
        }
    }

    /// Reads `len` bytes at `offset` within this region, fetching
    /// from the backend if the region's data is not resident.
    pub fn read(
        &self,
        backend: &Backend,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>> {
        if let Some(slice) = self.as_slice() {
            let start = offset as usize;
            let end = start + len as usize;
            let bytes = slice.get(start..end).ok_or(Error::CorruptIndex)?;
            return Ok(bytes.to_vec());
        }
        backend.fetch(self.desc.fsoffset + offset, len)
    }
}

/// Loads a region descriptor at `desc_offset` and materializes its
/// data per §4.3.
///
/// `force_virtual` mirrors the original driver's `force_va`: it makes
/// a region resident in memory rather than left lazy when it isn't
/// already eligible for zero-copy mapping. A region whose whole range
/// fits in the mapped window is always served as a `Mapped` slice
/// regardless of `force_virtual` — that's already a plain memory read,
/// `is_xip_eligible` requires `fsoffset + size <= mmap_size`, so an
/// eligible region can never straddle the window boundary for
/// `force_virtual` to act on. `force_virtual` only changes the
/// outcome for a region that is *not* eligible (too big for the
/// window, compressed, or `incore`): there it forces an owned copy
/// instead of `Lazy`.
pub fn load_region<'a>(
    backend: &Backend<'a>,
    desc_offset: u64,
    force_virtual: bool,
) -> Result<Region<'a>> {
    let raw = backend.fetch(desc_offset, REGION_DESC_SIZE as u64)?;
    let desc = RegionDescOnMedia::parse(&raw)?;

    if desc.size == 0 {
        return Ok(Region { desc, data: RegionData::Lazy });
    }

    if desc.is_xip_eligible(backend.mmap_size()) {
        if let Some(slice) = backend.window_slice(desc.fsoffset, desc.size) {
            return Ok(Region { desc, data: RegionData::Mapped(slice) });
        }
    }

    if desc.incore != 0 || desc.is_compressed() || force_virtual {
        if desc.is_compressed() {
            let compressed =
                backend.fetch(desc.fsoffset, desc.compressed_size)?;
            let mut out = vec![0u8; desc.size as usize];
            let n = crate::inflate::inflate(&compressed, &mut out)?;
            if n != out.len() {
                return Err(Error::CorruptInflateSize);
            }
            return Ok(Region { desc, data: RegionData::Owned(out) });
        }
        let owned = backend.fetch(desc.fsoffset, desc.size)?;
        return Ok(Region { desc, data: RegionData::Owned(owned) });
    }

    Ok(Region { desc, data: RegionData::Lazy })
}
