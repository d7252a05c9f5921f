// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed accessors over the 18 regions, grouping them by role (§3.1,
//! §4.4) and hiding the `stitch` codec behind plain `u64`/`u8`
//! getters. Every table here is loaded with `force_virtual` set
//! (§4.3), so it is always resident in memory — either mapped
//! zero-copy (if it fits the window) or copied/inflated into an owned
//! buffer (if it doesn't) — and every lookup here is a memory read;
//! only the three bulk data regions (`xip`, `byte_aligned`,
//! `compressed`) may be left lazy and thus fall back to the backend.

use crate::backend::Backend;
use crate::result::{Error, Result};
use crate::stitch::stitch;
use crate::superblock::{region_index as ri, SuperBlock, NUM_REGIONS};
use crate::region::{load_region, Region};
use alloc::vec::Vec;

/// The 18 loaded regions plus the typed accessors over them.
pub struct Metadata<'a> {
    regions: Vec<Region<'a>>,
}

impl<'a> Metadata<'a> {
    /// Loads all 18 regions named in the superblock. Bulk data
    /// regions (`xip`, `byte_aligned`, `compressed`) are loaded
    /// however the region loader sees fit (possibly lazily); every
    /// other region is force-virtualized so that table lookups never
    /// touch the backend.
    pub fn load(
        backend: &Backend<'a>,
        sb: &SuperBlock,
    ) -> Result<Metadata<'a>> {
        let mut regions = Vec::with_capacity(NUM_REGIONS);
        for i in 0..NUM_REGIONS {
            let force_virtual = !matches!(i, ri::XIP | ri::BYTE_ALIGNED | ri::COMPRESSED);
            let region =
                load_region(backend, sb.region_offset(i), force_virtual)?;
            regions.push(region);
        }
        Ok(Metadata { regions })
    }

    fn region(&self, index: usize) -> &Region<'a> {
        &self.regions[index]
    }

    #[cfg(test)]
    pub(crate) fn from_regions_for_test(regions: Vec<Region<'a>>) -> Metadata<'a> {
        Metadata { regions }
    }

    /// Stitches entry `index` out of the table at `region_index`,
    /// which must be resident (force-virtualized at load time).
    fn table_at(&self, region_index: usize, index: u64) -> Result<u64> {
        let region = self.region(region_index);
        let slice = region.as_slice().ok_or(Error::CorruptRegion)?;
        stitch(slice, region.desc.max_index, region.desc.table_byte_depth, index)
    }

    pub fn node_type(&self, array_idx: u64) -> Result<u8> {
        let region = self.region(ri::NODE_TYPE);
        let slice = region.as_slice().ok_or(Error::CorruptRegion)?;
        let byte = *slice
            .get(array_idx as usize)
            .ok_or(Error::CorruptIndex)?;
        if byte > 2 {
            return Err(Error::CorruptNodeType);
        }
        Ok(byte)
    }

    pub fn node_index(&self, array_idx: u64) -> Result<u64> {
        self.table_at(ri::NODE_INDEX, array_idx)
    }

    pub fn cnode_offset(&self, n_index: u64) -> Result<u64> {
        self.table_at(ri::CNODE_OFFSET, n_index)
    }

    pub fn cnode_index(&self, n_index: u64) -> Result<u64> {
        self.table_at(ri::CNODE_INDEX, n_index)
    }

    pub fn banode_offset(&self, n_index: u64) -> Result<u64> {
        self.table_at(ri::BANODE_OFFSET, n_index)
    }

    /// The start offset, within the `compressed` region, of cblock
    /// `k`. The cblock's length is `cblock_offset(k + 1) -
    /// cblock_offset(k)`.
    pub fn cblock_offset(&self, k: u64) -> Result<u64> {
        self.table_at(ri::CBLOCK_OFFSET, k)
    }

    pub fn inode_file_size(&self, inode: u64) -> Result<u64> {
        self.table_at(ri::INODE_FILE_SIZE, inode)
    }

    pub fn inode_name_offset(&self, inode: u64) -> Result<u64> {
        self.table_at(ri::INODE_NAME_OFFSET, inode)
    }

    pub fn inode_num_entries(&self, inode: u64) -> Result<u64> {
        self.table_at(ri::INODE_NUM_ENTRIES, inode)
    }

    pub fn inode_mode_index(&self, inode: u64) -> Result<u64> {
        self.table_at(ri::INODE_MODE_INDEX, inode)
    }

    pub fn inode_array_index(&self, inode: u64) -> Result<u64> {
        self.table_at(ri::INODE_ARRAY_INDEX, inode)
    }

    pub fn mode_raw(&self, mode_index: u64) -> Result<u64> {
        self.table_at(ri::MODES, mode_index)
    }

    pub fn uid(&self, mode_index: u64) -> Result<u64> {
        self.table_at(ri::UIDS, mode_index)
    }

    pub fn gid(&self, mode_index: u64) -> Result<u64> {
        self.table_at(ri::GIDS, mode_index)
    }

    /// Reads the NUL-terminated name starting at `offset` within the
    /// `strings` region, returning it without the terminator.
    pub fn name_at(&self, offset: u64) -> Result<&[u8]> {
        let region = self.region(ri::STRINGS);
        let slice = region.as_slice().ok_or(Error::CorruptRegion)?;
        let start = offset as usize;
        let rest = slice.get(start..).ok_or(Error::CorruptIndex)?;
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        if end > 255 {
            return Err(Error::CorruptRegion);
        }
        Ok(&rest[..end])
    }

    pub fn xip_region(&self) -> &Region<'a> {
        self.region(ri::XIP)
    }

    pub fn byte_aligned_region(&self) -> &Region<'a> {
        self.region(ri::BYTE_ALIGNED)
    }

    pub fn compressed_region(&self) -> &Region<'a> {
        self.region(ri::COMPRESSED)
    }
}
