// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The "byte table" codec.
//!
//! A byte table stores only as many bytes per entry as its dynamic
//! range requires: a table of `max_index` values that each fit in
//! `depth` bytes is laid out as `depth` concatenated lanes, each
//! `max_index` bytes long, rather than `max_index` packed
//! `depth`-byte integers. Entry `i` is reconstructed by summing lane
//! `k`'s byte at `i`, shifted left by `8*k`. The on-media encoding
//! this replaces (`AXFS_U64_STITCH`/`AXFS_U32_STITCH` in the original
//! driver) treats an absent lane pointer as contributing zero; here
//! that is simply "lane index `>= depth`".

use crate::result::{Error, Result};

/// Reconstructs entry `index` of a byte table stored in `table`,
/// which holds `depth` concatenated lanes of `max_index` bytes each
/// (`table.len() == depth as u64 * max_index`).
///
/// A `depth` of 0 means the table is absent; any index returns 0.
pub fn stitch(
    table: &[u8],
    max_index: u64,
    depth: u8,
    index: u64,
) -> Result<u64> {
    if depth == 0 {
        return Ok(0);
    }
    if index >= max_index {
        return Err(Error::CorruptIndex);
    }
    if table.len() as u64 != depth as u64 * max_index {
        return Err(Error::CorruptRegion);
    }
    let mut value: u64 = 0;
    for lane in 0..depth {
        let offset = lane as u64 * max_index + index;
        value |= (table[offset as usize] as u64) << (8 * lane as u32);
    }
    Ok(value)
}
