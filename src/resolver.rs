// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-page node resolver (§4.4): given an inode and a 0-based
//! page index within that file, decides which of the three transport
//! paths serves that page's bytes.

use crate::metadata::Metadata;
use crate::profile::PageObserver;
use crate::result::{Error, Result};

/// Where one page's bytes live.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageSource {
    /// A page directly addressable in the `xip` region, at
    /// `page_index << page_shift` within it.
    Xip { page_index: u64 },
    /// A page whose plaintext lives at `inner_offset` within the
    /// decompressed form of cblock `cnode`.
    Compressed { cnode: u64, inner_offset: u64 },
    /// A page whose bytes live at `src_offset` within the
    /// `byte_aligned` region.
    ByteAligned { src_offset: u64 },
}

/// Resolves the page at `array_idx` (already `inode_array_index[inode]
/// + page_index`) to its `PageSource`, notifying `observer` of the
/// access. The secondary tables are indexed by `n_index`, read from
/// `node_index[array_idx]`, never by `array_idx` itself (§4.4).
pub fn resolve(
    metadata: &Metadata,
    observer: &dyn PageObserver,
    inode: u64,
    array_idx: u64,
) -> Result<PageSource> {
    observer.on_page_access(inode, array_idx);

    let n_type = metadata.node_type(array_idx)?;
    let n_index = metadata.node_index(array_idx)?;
    match n_type {
        0 => Ok(PageSource::Xip { page_index: n_index }),
        1 => {
            let cnode = metadata.cnode_index(n_index)?;
            let inner_offset = metadata.cnode_offset(n_index)?;
            Ok(PageSource::Compressed { cnode, inner_offset })
        }
        2 => {
            let src_offset = metadata.banode_offset(n_index)?;
            Ok(PageSource::ByteAligned { src_offset })
        }
        _ => Err(Error::CorruptNodeType),
    }
}
