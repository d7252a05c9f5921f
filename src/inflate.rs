// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DEFLATE (zlib container) decompression, via `miniz_oxide`.
//!
//! Every cblock is a standalone zlib stream that inflates to exactly
//! `cblock_size` bytes, except possibly the final cblock in the
//! image, which may inflate to less. Callers clamp.

use crate::result::{Error, Result};
use miniz_oxide::inflate::TINFLStatus;
use miniz_oxide::inflate::core::decompress;
use miniz_oxide::inflate::core::inflate_flags::TINFL_FLAG_PARSE_ZLIB_HEADER;
use miniz_oxide::inflate::core::DecompressorOxide;

/// Inflates `src` into `dst`, returning the number of bytes written.
///
/// Fails with `Error::Decompress` if the stream is truncated or
/// malformed; a short but *valid* stream (the final, partial cblock)
/// succeeds and returns fewer bytes than `dst.len()`.
pub fn inflate(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    let mut r = DecompressorOxide::new();
    let flags = TINFL_FLAG_PARSE_ZLIB_HEADER;
    let (status, _, written) = decompress(&mut r, src, dst, 0, flags);
    match status {
        TINFLStatus::Done => Ok(written),
        _ => Err(Error::Decompress),
    }
}
