// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

/// Errors returned by the AXFS reader.
///
/// `Corrupt*` variants cover everything that makes an image, or a
/// region within one, structurally invalid; they are fatal to `open`
/// and, for any post-open operation that hits one, fatal only to that
/// operation. `BackendIO` and `Decompress` are recoverable: the
/// `Image` stays usable for other inodes and other cblocks.
#[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd)]
pub enum Error {
    CorruptMagic,
    CorruptSignature,
    CorruptCompressionType,
    CorruptRegion,
    CorruptNodeType,
    CorruptIndex,
    CorruptInflateSize,
    BackendIO,
    Decompress,
    NotFound,
    NotDirectory,
    NotSymlink,
    NotRegular,
}

impl Error {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CorruptMagic => "axfs: bad magic number in superblock",
            Self::CorruptSignature => "axfs: bad signature in superblock",
            Self::CorruptCompressionType => {
                "axfs: unsupported compression type"
            }
            Self::CorruptRegion => "axfs: truncated or malformed region",
            Self::CorruptNodeType => "axfs: unknown node type",
            Self::CorruptIndex => "axfs: index out of range",
            Self::CorruptInflateSize => "axfs: inflated region size mismatch",
            Self::BackendIO => "axfs: backend read failed",
            Self::Decompress => "axfs: DEFLATE decompression failed",
            Self::NotFound => "axfs: no such file or directory",
            Self::NotDirectory => "axfs: not a directory",
            Self::NotSymlink => "axfs: not a symbolic link",
            Self::NotRegular => "axfs: not a regular file",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
