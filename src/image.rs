// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The top-level `Image` type: the public surface of the reader
//! (§6.5), wiring the backend, superblock, metadata, resolver, and
//! cache together.

use crate::backend::Backend;
use crate::cache::CblockCache;
use crate::metadata::Metadata;
use crate::mode::Mode;
use crate::profile::{NullObserver, PageObserver};
use crate::resolver::{resolve, PageSource};
use crate::result::{Error, Result};
use crate::superblock::{SuperBlock, SUPERBLOCK_SIZE};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

/// The complete, read-only, open image. Immutable after construction
/// except for the cblock cache (§3.3).
pub struct Image<'a> {
    backend: Backend<'a>,
    sb: SuperBlock,
    metadata: Metadata<'a>,
    cache: CblockCache,
    observer: Box<dyn PageObserver + 'a>,
}

impl<'a> Image<'a> {
    /// Opens an image over `backend`, parsing and validating the
    /// superblock, loading every region, and rejecting anything that
    /// does not parse cleanly. Fail-fast: no partial `Image` is ever
    /// returned (§7).
    pub fn open(backend: Backend<'a>) -> Result<Image<'a>> {
        Self::open_with_observer(backend, Box::new(NullObserver))
    }

    /// As `open`, but page resolutions are reported to `observer`
    /// instead of being silently dropped.
    pub fn open_with_observer(
        backend: Backend<'a>,
        observer: Box<dyn PageObserver + 'a>,
    ) -> Result<Image<'a>> {
        let header = backend.fetch(0, SUPERBLOCK_SIZE as u64)?;
        let sb = SuperBlock::parse(&header)?;
        let metadata = Metadata::load(&backend, &sb)?;
        let cache = CblockCache::new(sb.cblock_size as usize);
        let image = Image { backend, sb, metadata, cache, observer };
        if !image.mode(image.root())?.is_dir() {
            return Err(Error::NotDirectory);
        }
        Ok(image)
    }

    /// Inode 0, the filesystem root (§3.1).
    pub fn root(&self) -> u64 {
        0
    }

    fn mode_index(&self, inode: u64) -> Result<u64> {
        self.metadata.inode_mode_index(inode)
    }

    pub fn mode(&self, inode: u64) -> Result<Mode> {
        let idx = self.mode_index(inode)?;
        Ok(Mode(self.metadata.mode_raw(idx)? as u16))
    }

    pub fn uid(&self, inode: u64) -> Result<u32> {
        let idx = self.mode_index(inode)?;
        Ok(self.metadata.uid(idx)? as u32)
    }

    pub fn gid(&self, inode: u64) -> Result<u32> {
        let idx = self.mode_index(inode)?;
        Ok(self.metadata.gid(idx)? as u32)
    }

    pub fn file_size(&self, inode: u64) -> Result<u64> {
        self.metadata.inode_file_size(inode)
    }

    pub fn num_entries(&self, inode: u64) -> Result<u64> {
        self.metadata.inode_num_entries(inode)
    }

    /// The inode's own name, as stored by its parent directory.
    /// Meaningless (and typically unset) for the root inode, which
    /// has no parent entry.
    pub fn name(&self, inode: u64) -> Result<&[u8]> {
        let offset = self.metadata.inode_name_offset(inode)?;
        self.metadata.name_at(offset)
    }

    /// Calls `visitor(name, child_inode, mode)` for each of
    /// `dir_inode`'s children, in ascending name order (§4.7).
    pub fn enumerate(
        &self,
        dir_inode: u64,
        mut visitor: impl FnMut(&[u8], u64, Mode),
    ) -> Result<()> {
        if !self.mode(dir_inode)?.is_dir() {
            return Err(Error::NotDirectory);
        }
        let base = self.metadata.inode_array_index(dir_inode)?;
        let n = self.metadata.inode_num_entries(dir_inode)?;
        for i in 0..n {
            let child = base + i;
            let name = self.name(child)?;
            let mode = self.mode(child)?;
            visitor(name, child, mode);
        }
        Ok(())
    }

    /// Looks up `needle` among `dir_inode`'s children. Exits early
    /// once a name's first byte exceeds `needle`'s, relying on
    /// ascending name order (§4.7).
    pub fn lookup(&self, dir_inode: u64, needle: &[u8]) -> Result<Option<u64>> {
        if !self.mode(dir_inode)?.is_dir() {
            return Err(Error::NotDirectory);
        }
        let base = self.metadata.inode_array_index(dir_inode)?;
        let n = self.metadata.inode_num_entries(dir_inode)?;
        for i in 0..n {
            let child = base + i;
            let name = self.name(child)?;
            match name.cmp(needle) {
                core::cmp::Ordering::Equal => return Ok(Some(child)),
                core::cmp::Ordering::Greater => return Ok(None),
                core::cmp::Ordering::Less => continue,
            }
        }
        Ok(None)
    }

    /// The core page-by-page copy loop (§4.6). `start` is expected to
    /// be page-aligned; unaligned starts are the caller's
    /// responsibility (§9, open question).
    fn copy_pages(
        &self,
        inode: u64,
        start: u64,
        length: u64,
        dst: &mut [u8],
    ) -> Result<usize> {
        let page_size = self.sb.page_size();
        let base = self.metadata.inode_array_index(inode)?;
        let mut array_idx = base + start / page_size;
        let mut cursor = 0usize;
        let mut remaining = length;
        while remaining > 0 {
            let page =
                resolve(&self.metadata, self.observer.as_ref(), inode, array_idx)?;
            let take = core::cmp::min(page_size, remaining) as usize;
            match page {
                PageSource::Xip { page_index } => {
                    let off = page_index
                        .checked_mul(page_size)
                        .ok_or(Error::CorruptIndex)?;
                    let bytes = self.metadata.xip_region().read(
                        &self.backend,
                        off,
                        take as u64,
                    )?;
                    dst[cursor..cursor + take].copy_from_slice(&bytes);
                }
                PageSource::ByteAligned { src_offset } => {
                    let bytes = self.metadata.byte_aligned_region().read(
                        &self.backend,
                        src_offset,
                        take as u64,
                    )?;
                    dst[cursor..cursor + take].copy_from_slice(&bytes);
                }
                PageSource::Compressed { cnode, inner_offset } => {
                    let n = self.cache.read_into(
                        &self.metadata,
                        &self.backend,
                        cnode,
                        inner_offset,
                        &mut dst[cursor..cursor + take],
                    )?;
                    if n < take {
                        return Err(Error::CorruptRegion);
                    }
                }
            }
            cursor += take;
            remaining -= take as u64;
            array_idx += 1;
        }
        Ok(cursor)
    }

    /// Reads up to `max_len` bytes of `inode`'s content starting at
    /// `start` into `dst`, returning the number of bytes written
    /// (§4.6). `inode` must be a regular file.
    pub fn read_file(
        &self,
        inode: u64,
        start: u64,
        max_len: u64,
        dst: &mut [u8],
    ) -> Result<usize> {
        if !self.mode(inode)?.is_regular() {
            return Err(Error::NotRegular);
        }
        let size = self.file_size(inode)?;
        if start >= size {
            return Ok(0);
        }
        let length = core::cmp::min(size - start, max_len);
        if length == 0 {
            return Ok(0);
        }
        if (dst.len() as u64) < length {
            return Err(Error::CorruptRegion);
        }
        self.copy_pages(inode, start, length, dst)
    }

    /// Reads a symbolic link's entire target (§4.8). No trailing NUL
    /// is guaranteed or added.
    pub fn read_symlink(&self, inode: u64) -> Result<Vec<u8>> {
        if !self.mode(inode)?.is_symlink() {
            return Err(Error::NotSymlink);
        }
        let size = self.file_size(inode)?;
        let mut buf = vec![0u8; size as usize];
        self.copy_pages(inode, 0, size, &mut buf)?;
        Ok(buf)
    }

    /// The underlying cache's resident cnode, if any. Exposed for
    /// coherence checks; not part of normal reader use.
    pub fn current_cnode(&self) -> Option<u64> {
        self.cache.current_cnode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use miniz_oxide::deflate::compress_to_vec_zlib;

    const PAGE_SHIFT: u8 = 12;
    const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

    /// Builds a minimal, fully in-memory AXFS image with one
    /// directory (inode 0) and a caller-supplied set of children, and
    /// returns it alongside the inode number assigned to each child
    /// in order.
    struct ImageBuilder {
        strings: Vec<u8>,
        xip: Vec<u8>,
        byte_aligned: Vec<u8>,
        compressed: Vec<u8>,
        node_type: Vec<u8>,
        node_index: Vec<u64>,
        cnode_offset: Vec<u64>,
        cnode_index: Vec<u64>,
        banode_offset: Vec<u64>,
        cblock_offset: Vec<u64>,
        inode_file_size: Vec<u64>,
        inode_name_offset: Vec<u64>,
        inode_num_entries: Vec<u64>,
        inode_mode_index: Vec<u64>,
        inode_array_index: Vec<u64>,
        modes: Vec<u64>,
        uids: Vec<u64>,
        gids: Vec<u64>,
        cblock_size: u32,
    }

    impl ImageBuilder {
        fn new() -> ImageBuilder {
            ImageBuilder {
                strings: Vec::new(),
                xip: Vec::new(),
                byte_aligned: Vec::new(),
                compressed: Vec::new(),
                node_type: Vec::new(),
                node_index: Vec::new(),
                cnode_offset: Vec::new(),
                cnode_index: Vec::new(),
                banode_offset: Vec::new(),
                cblock_offset: vec![0],
                inode_file_size: Vec::new(),
                inode_name_offset: Vec::new(),
                inode_num_entries: Vec::new(),
                inode_mode_index: Vec::new(),
                inode_array_index: Vec::new(),
                modes: Vec::new(),
                uids: Vec::new(),
                gids: Vec::new(),
                cblock_size: 65536,
            }
        }

        fn with_cblock_size(mut self, size: u32) -> ImageBuilder {
            self.cblock_size = size;
            self
        }

        fn add_name(&mut self, name: &[u8]) -> u64 {
            let off = self.strings.len() as u64;
            self.strings.extend_from_slice(name);
            self.strings.push(0);
            off
        }

        fn add_mode(&mut self, mode: u16, uid: u32, gid: u32) -> u64 {
            let idx = self.modes.len() as u64;
            self.modes.push(mode as u64);
            self.uids.push(uid as u64);
            self.gids.push(gid as u64);
            idx
        }

        /// Appends one XIP page filled with `byte` and returns its
        /// array index.
        fn push_xip_page(&mut self, byte: u8) -> u64 {
            let page_index = (self.xip.len() as u64) / PAGE_SIZE;
            self.xip.extend(core::iter::repeat(byte).take(PAGE_SIZE as usize));
            let array_idx = self.node_type.len() as u64;
            self.node_type.push(0);
            self.node_index.push(page_index);
            array_idx
        }

        /// Appends one ByteAligned page holding `data` and returns its
        /// array index.
        fn push_ba_page(&mut self, data: &[u8]) -> u64 {
            let off = self.byte_aligned.len() as u64;
            self.byte_aligned.extend_from_slice(data);
            let array_idx = self.node_type.len() as u64;
            self.node_type.push(2);
            self.node_index.push(self.banode_offset.len() as u64);
            self.banode_offset.push(off);
            array_idx
        }

        /// Compresses `plain` as a new, standalone cblock and returns
        /// its cnode index.
        fn add_cblock(&mut self, plain: &[u8]) -> u64 {
            let z = compress_to_vec_zlib(plain, 6);
            self.compressed.extend_from_slice(&z);
            self.cblock_offset.push(self.compressed.len() as u64);
            (self.cblock_offset.len() - 2) as u64
        }

        /// Appends one Compressed page pointing at `inner_offset`
        /// within cblock `cnode` and returns its array index.
        fn push_compressed_page(&mut self, cnode: u64, inner_offset: u64) -> u64 {
            let array_idx = self.node_type.len() as u64;
            self.node_type.push(1);
            let n_index = self.cnode_index.len() as u64;
            self.node_index.push(n_index);
            self.cnode_index.push(cnode);
            self.cnode_offset.push(inner_offset);
            array_idx
        }

        fn add_file(&mut self, name: &[u8], size: u64, array_idx: u64, mode: u16) -> u64 {
            let inode = self.inode_file_size.len() as u64;
            let name_off = self.add_name(name);
            let mode_idx = self.add_mode(mode, 0, 0);
            self.inode_file_size.push(size);
            self.inode_name_offset.push(name_off);
            self.inode_num_entries.push(0);
            self.inode_mode_index.push(mode_idx);
            self.inode_array_index.push(array_idx);
            inode
        }

        fn build(mut self, root_children: u64) -> Vec<u8> {
            // Inode 0 (root) is always defined last so children's
            // inode numbers start at 1, matching S3/S5/S6 in spirit.
            let root_name_off = self.add_name(b"");
            let root_mode_idx = self.add_mode(0o040755, 0, 0);
            self.inode_file_size.insert(0, 0);
            self.inode_name_offset.insert(0, root_name_off);
            self.inode_num_entries.insert(0, root_children);
            self.inode_mode_index.insert(0, root_mode_idx);
            self.inode_array_index.insert(0, 1);

            fn lanes(values: &[u64], depth: u8) -> Vec<u8> {
                let max_index = values.len().max(1) as u64;
                let mut table = vec![0u8; depth as usize * max_index as usize];
                for (i, &v) in values.iter().enumerate() {
                    for lane in 0..depth {
                        table[lane as usize * max_index as usize + i] =
                            (v >> (8 * lane as u32)) as u8;
                    }
                }
                table
            }

            let node_index_bytes = lanes(&self.node_index, 8);
            let cnode_offset_bytes = lanes(&self.cnode_offset, 4);
            let cnode_index_bytes = lanes(&self.cnode_index, 8);
            let banode_offset_bytes = lanes(&self.banode_offset, 8);
            let cblock_offset_bytes = lanes(&self.cblock_offset, 8);
            let inode_file_size_bytes = lanes(&self.inode_file_size, 8);
            let inode_name_offset_bytes = lanes(&self.inode_name_offset, 8);
            let inode_num_entries_bytes = lanes(&self.inode_num_entries, 8);
            let inode_mode_index_bytes = lanes(&self.inode_mode_index, 8);
            let inode_array_index_bytes = lanes(&self.inode_array_index, 8);
            let modes_bytes = lanes(&self.modes, 8);
            let uids_bytes = lanes(&self.uids, 8);
            let gids_bytes = lanes(&self.gids, 8);

            let mut regions: Vec<(Vec<u8>, u64, u8)> = Vec::new();
            regions.push((self.strings.clone(), 0, 0));
            regions.push((self.xip.clone(), 0, 0));
            regions.push((self.byte_aligned.clone(), 0, 0));
            regions.push((self.compressed.clone(), 0, 0));
            regions.push((self.node_type.clone(), self.node_type.len() as u64, 1));
            regions.push((node_index_bytes, self.node_index.len() as u64, 8));
            regions.push((cnode_offset_bytes, self.cnode_offset.len() as u64, 4));
            regions.push((cnode_index_bytes, self.cnode_index.len() as u64, 8));
            regions.push((banode_offset_bytes, self.banode_offset.len() as u64, 8));
            regions.push((cblock_offset_bytes, self.cblock_offset.len() as u64, 8));
            regions.push((inode_file_size_bytes, self.inode_file_size.len() as u64, 8));
            regions.push((inode_name_offset_bytes, self.inode_name_offset.len() as u64, 8));
            regions.push((inode_num_entries_bytes, self.inode_num_entries.len() as u64, 8));
            regions.push((inode_mode_index_bytes, self.inode_mode_index.len() as u64, 8));
            regions.push((inode_array_index_bytes, self.inode_array_index.len() as u64, 8));
            regions.push((modes_bytes, self.modes.len() as u64, 8));
            regions.push((uids_bytes, self.uids.len() as u64, 8));
            regions.push((gids_bytes, self.gids.len() as u64, 8));

            const SB_SIZE: usize = crate::superblock::SUPERBLOCK_SIZE;
            // Region descriptors occupy a fixed-size table right after
            // the superblock; region payloads follow immediately.
            let desc_table_size =
                (regions.len() * crate::region::REGION_DESC_SIZE) as u64;
            let mut descs = Vec::new();
            let mut payload = Vec::new();
            let mut payload_cursor = SB_SIZE as u64 + desc_table_size;
            for (bytes, max_index, depth) in &regions {
                let fsoffset = payload_cursor;
                let size = bytes.len() as u64;
                descs.extend_from_slice(&fsoffset.to_be_bytes());
                descs.extend_from_slice(&size.to_be_bytes());
                descs.extend_from_slice(&0u64.to_be_bytes()); // compressed_size
                descs.extend_from_slice(&max_index.to_be_bytes());
                descs.push(*depth);
                descs.push(0); // incore
                payload.extend_from_slice(bytes);
                payload_cursor += size;
            }

            let mut image = vec![0u8; SB_SIZE];
            image[0..4].copy_from_slice(&crate::superblock::MAGIC.to_be_bytes());
            image[4..20].copy_from_slice(crate::superblock::SIGNATURE);
            image[60..64].copy_from_slice(&self.cblock_size.to_be_bytes());
            image[64..72].copy_from_slice(
                &(self.inode_file_size.len() as u64).to_be_bytes(),
            );
            image.extend_from_slice(&descs);
            image.extend_from_slice(&payload);
            let total_size = image.len() as u64;
            image[72..80].copy_from_slice(&total_size.to_be_bytes());
            image[80..88].copy_from_slice(&(self.node_type.len() as u64).to_be_bytes());
            image[88..96].copy_from_slice(&total_size.to_be_bytes());
            for i in 0..regions.len() {
                let off = SB_SIZE as u64 + (i * crate::region::REGION_DESC_SIZE) as u64;
                image[96 + i * 8..96 + i * 8 + 8].copy_from_slice(&off.to_be_bytes());
            }
            image[243] = 0;
            image[252] = PAGE_SHIFT;
            image
        }
    }

    #[test]
    fn s3_single_xip_file() {
        let mut b = ImageBuilder::new();
        let array_idx = b.push_xip_page(0xAB);
        assert_eq!(array_idx, 0);
        b.add_file(b"a", PAGE_SIZE, 0, 0o100644);
        let bytes = b.build(1);
        let backend = Backend::from_slice(&bytes);
        let image = Image::open(backend).unwrap();
        assert!(image.mode(image.root()).unwrap().is_dir());
        let mut dst = vec![0u8; PAGE_SIZE as usize];
        let n = image.read_file(1, 0, PAGE_SIZE, &mut dst).unwrap();
        assert_eq!(n, PAGE_SIZE as usize);
        assert!(dst.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn s2_empty_root() {
        let b = ImageBuilder::new();
        let bytes = b.build(0);
        let backend = Backend::from_slice(&bytes);
        let image = Image::open(backend).unwrap();
        assert_eq!(image.num_entries(image.root()).unwrap(), 0);
        let mut seen = 0;
        image.enumerate(image.root(), |_, _, _| seen += 1).unwrap();
        assert_eq!(seen, 0);
    }

    #[test]
    fn s6_symlink_round_trip() {
        let mut b = ImageBuilder::new();
        let array_idx = b.push_ba_page(b"hello/world");
        b.add_file(b"link", 11, array_idx, 0o120777);
        let bytes = b.build(1);
        let backend = Backend::from_slice(&bytes);
        let image = Image::open(backend).unwrap();
        let target = image.read_symlink(1).unwrap();
        assert_eq!(target, b"hello/world");
    }

    #[test]
    fn s4_compressed_spanning_two_cblocks() {
        let mut b = ImageBuilder::new().with_cblock_size(8192);
        let full_plain: Vec<u8> =
            (0..10000u32).map(|i| i as u8).collect();
        let cnode0 = b.add_cblock(&full_plain[0..8192]);
        let page0 = b.push_compressed_page(cnode0, 0);
        let page1 = b.push_compressed_page(cnode0, 4096);
        let cnode1 = b.add_cblock(&full_plain[8192..10000]);
        let page2 = b.push_compressed_page(cnode1, 0);
        assert_eq!((page0, page1, page2), (0, 1, 2));
        b.add_file(b"big", 10000, page0, 0o100644);
        let bytes = b.build(1);
        let backend = Backend::from_slice(&bytes);
        let image = Image::open(backend).unwrap();
        let mut dst = vec![0u8; 10000];
        let n = image.read_file(1, 0, 10000, &mut dst).unwrap();
        assert_eq!(n, 10000);
        assert_eq!(dst, full_plain);
        assert_eq!(image.current_cnode(), Some(1));
    }

    #[test]
    fn s5_byte_aligned_tail() {
        let mut b = ImageBuilder::new();
        let xip_idx = b.push_xip_page(0xCD);
        let ba_data: Vec<u8> = (0..904u32).map(|i| i as u8).collect();
        let ba_idx = b.push_ba_page(&ba_data);
        assert_eq!((xip_idx, ba_idx), (0, 1));
        b.add_file(b"tail", 5000, xip_idx, 0o100644);
        let bytes = b.build(1);
        let backend = Backend::from_slice(&bytes);
        let image = Image::open(backend).unwrap();
        let mut dst = vec![0u8; 5000];
        let n = image.read_file(1, 0, 5000, &mut dst).unwrap();
        assert_eq!(n, 5000);
        assert!(dst[..4096].iter().all(|&b| b == 0xCD));
        assert_eq!(&dst[4096..5000], ba_data.as_slice());
    }

    #[test]
    fn lookup_finds_and_misses() {
        let mut b = ImageBuilder::new();
        let a0 = b.push_xip_page(1);
        b.add_file(b"aaa", PAGE_SIZE, a0, 0o100644);
        let a1 = b.push_xip_page(2);
        b.add_file(b"bbb", PAGE_SIZE, a1, 0o100644);
        let bytes = b.build(2);
        let backend = Backend::from_slice(&bytes);
        let image = Image::open(backend).unwrap();
        assert_eq!(image.lookup(image.root(), b"bbb").unwrap(), Some(2));
        assert_eq!(image.lookup(image.root(), b"zzz").unwrap(), None);
    }
}
