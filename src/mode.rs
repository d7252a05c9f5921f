// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The POSIX mode word stored in the `modes` attribute table, broken
//! out into its constituent permission and file-type bits (§6.5).

use bitstruct::bitstruct;
use core::fmt;
use core::fmt::Write as _;

/// The traditional Unix file-type nibble, occupying bits 12..=15 of a
/// mode word.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileType {
    Unused,
    Fifo,
    Char,
    Dir,
    Block,
    Regular,
    SymLink,
    Sock,
}

const S_IFIFO: u8 = 0o01;
const S_IFCHR: u8 = 0o02;
const S_IFDIR: u8 = 0o04;
const S_IFBLK: u8 = 0o06;
const S_IFREG: u8 = 0o10;
const S_IFLNK: u8 = 0o12;
const S_IFSOCK: u8 = 0o14;

impl FileType {
    fn as_char(self) -> char {
        match self {
            FileType::Unused => 'X',
            FileType::Fifo => 'p',
            FileType::Char => 'c',
            FileType::Dir => 'd',
            FileType::Block => 'b',
            FileType::Regular => '-',
            FileType::SymLink => 'l',
            FileType::Sock => 's',
        }
    }
}

bitstruct! {
    /// The decoded representation of an inode's mode word.
    #[derive(Clone, Copy)]
    pub struct Mode(u16) {
        ox: bool = 0;
        ow: bool = 1;
        or: bool = 2;
        gx: bool = 3;
        gw: bool = 4;
        gr: bool = 5;
        ux: bool = 6;
        uw: bool = 7;
        ur: bool = 8;
        sticky: bool = 9;
        sgid: bool = 10;
        suid: bool = 11;
        typ: FileType = 12..=15;
    }
}

impl bitstruct::FromRaw<u8, FileType> for Mode {
    fn from_raw(raw: u8) -> FileType {
        match raw {
            S_IFIFO => FileType::Fifo,
            S_IFCHR => FileType::Char,
            S_IFDIR => FileType::Dir,
            S_IFBLK => FileType::Block,
            S_IFREG => FileType::Regular,
            S_IFLNK => FileType::SymLink,
            S_IFSOCK => FileType::Sock,
            _ => FileType::Unused,
        }
    }
}

impl bitstruct::IntoRaw<u8, FileType> for Mode {
    fn into_raw(bits: FileType) -> u8 {
        match bits {
            FileType::Fifo => S_IFIFO,
            FileType::Char => S_IFCHR,
            FileType::Dir => S_IFDIR,
            FileType::Block => S_IFBLK,
            FileType::Regular => S_IFREG,
            FileType::SymLink => S_IFLNK,
            FileType::Sock => S_IFSOCK,
            FileType::Unused => 0,
        }
    }
}

impl Mode {
    pub fn is_dir(&self) -> bool {
        self.typ() == FileType::Dir
    }

    pub fn is_regular(&self) -> bool {
        self.typ() == FileType::Regular
    }

    pub fn is_symlink(&self) -> bool {
        self.typ() == FileType::SymLink
    }
}

/// Mirrors `ls -l`'s first column: type character followed by the
/// nine permission bits.
impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn alt(b: bool, t: char, f: char) -> char {
            if b { t } else { f }
        }
        f.write_char(self.typ().as_char())?;
        f.write_char(alt(self.ur(), 'r', '-'))?;
        f.write_char(alt(self.uw(), 'w', '-'))?;
        if !self.suid() {
            f.write_char(alt(self.ux(), 'x', '-'))?;
        } else {
            f.write_char(alt(self.ux(), 's', 'S'))?;
        }
        f.write_char(alt(self.gr(), 'r', '-'))?;
        f.write_char(alt(self.gw(), 'w', '-'))?;
        if !self.sgid() {
            f.write_char(alt(self.gx(), 'x', '-'))?;
        } else {
            f.write_char(alt(self.gx(), 's', 'S'))?;
        }
        f.write_char(alt(self.or(), 'r', '-'))?;
        f.write_char(alt(self.ow(), 'w', '-'))?;
        if !self.sticky() {
            f.write_char(alt(self.ox(), 'x', '-'))?;
        } else {
            f.write_char(alt(self.ox(), 't', 'T'))?;
        }
        Ok(())
    }
}
