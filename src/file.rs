//! `ext4` file-related structures.
//!
//! [`File`] is the tagged representation of anything a directory entry can
//! point to; the variant is picked by a top-level dispatch on the inode's
//! file type nibble. [`FileContent`] is the logical-to-physical map of an
//! inode's data, interpreted lazily from the polymorphic 60-byte `i_block`
//! area: an extent tree under the `EXTENTS` inode flag, the legacy twelve
//! direct pointers otherwise.
//!
//! Decoded values are plain data: every operation that needs to touch the
//! device takes the session as an explicit parameter.

use crate::dir::{DirEntries, DxRoot, Ext4DirEntry};
use crate::error::{Ext4Error, Ext4Result};
use crate::extent::{parse_inode_extents, Extent};
use crate::inode::{Inode, InodeFlags, InodeNumber, InodeType};
use crate::sb::IncompatibleFeatureSet;
use crate::Ext4Fs;

/// Fast symlinks store their target directly in `i_block` when it is
/// shorter than the area itself.
const FAST_SYMLINK_MAX_LEN: u64 = 60;

/// A file-system object, tagged by its inode file type.
#[derive(Clone, Debug)]
pub enum File {
    Regular(RegularFile),
    Directory(Directory),
    SymbolicLink(SymbolicLink),
    Fifo(SpecialFile),
    CharacterDevice(SpecialFile),
    BlockDevice(SpecialFile),
    Socket(SpecialFile),
}

impl File {
    /// Builds the `File` variant matching the file type stored in the
    /// inode's mode field.
    pub fn from_inode(path: String, inode_no: InodeNumber, inode: Inode) -> Ext4Result<Self> {
        let meta = FileMeta {
            path,
            inode_no,
            inode,
        };

        Ok(match inode.inode_type()? {
            InodeType::Regular => Self::Regular(RegularFile(meta)),
            InodeType::Directory => Self::Directory(Directory(meta)),
            InodeType::SymbolicLink => Self::SymbolicLink(SymbolicLink(meta)),
            InodeType::Fifo => Self::Fifo(SpecialFile(meta)),
            InodeType::CharacterDevice => Self::CharacterDevice(SpecialFile(meta)),
            InodeType::BlockDevice => Self::BlockDevice(SpecialFile(meta)),
            InodeType::Socket => Self::Socket(SpecialFile(meta)),
        })
    }

    fn meta(&self) -> &FileMeta {
        match self {
            Self::Regular(f) => &f.0,
            Self::Directory(d) => &d.0,
            Self::SymbolicLink(l) => &l.0,
            Self::Fifo(s) | Self::CharacterDevice(s) | Self::BlockDevice(s) | Self::Socket(s) => {
                &s.0
            }
        }
    }

    /// The inode backing this file.
    #[must_use]
    pub fn inode(&self) -> &Inode {
        &self.meta().inode
    }

    /// The inode number backing this file.
    #[must_use]
    pub fn inode_no(&self) -> InodeNumber {
        self.meta().inode_no
    }

    /// Absolute path this file was resolved from.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.meta().path
    }

    /// Last component of the path.
    #[must_use]
    pub fn filename(&self) -> &str {
        self.meta().filename()
    }

    /// The content map of this file's data blocks.
    pub fn content(&self, fs: &Ext4Fs) -> Ext4Result<FileContent> {
        FileContent::new(fs, &self.meta().inode)
    }
}

/// Identity shared by every [`File`] variant.
#[derive(Clone, Debug)]
struct FileMeta {
    path: String,
    inode_no: InodeNumber,
    inode: Inode,
}

impl FileMeta {
    fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

macro_rules! file_variant_accessors {
    () => {
        /// The inode backing this file.
        #[must_use]
        pub fn inode(&self) -> &Inode {
            &self.0.inode
        }

        /// The inode number backing this file.
        #[must_use]
        pub fn inode_no(&self) -> InodeNumber {
            self.0.inode_no
        }

        /// Absolute path this file was resolved from.
        #[must_use]
        pub fn path(&self) -> &str {
            &self.0.path
        }

        /// Last component of the path.
        #[must_use]
        pub fn filename(&self) -> &str {
            self.0.filename()
        }

        /// Size of this file, in bytes.
        #[must_use]
        pub fn size(&self) -> u64 {
            self.0.inode.size()
        }

        /// The content map of this file's data blocks.
        pub fn content(&self, fs: &Ext4Fs) -> Ext4Result<FileContent> {
            FileContent::new(fs, &self.0.inode)
        }
    };
}

/// A regular file.
#[derive(Clone, Debug)]
pub struct RegularFile(FileMeta);

impl RegularFile {
    file_variant_accessors!();

    /// Reads the whole file.
    pub fn read_all(&self, fs: &Ext4Fs) -> Ext4Result<Vec<u8>> {
        self.content(fs)?.read(fs, 0, self.size())
    }
}

/// A directory.
#[derive(Clone, Debug)]
pub struct Directory(FileMeta);

impl Directory {
    file_variant_accessors!();

    /// Iterates over the entries of this directory, in on-disk order.
    ///
    /// Hash-tree indexed directories are scanned linearly: the index root
    /// in block 0 is validated, then skipped.
    pub fn entries<'fs>(&self, fs: &'fs Ext4Fs) -> Ext4Result<DirEntries<'fs>> {
        let blocks: Vec<u64> = self.content(fs)?.block_numbers().collect();
        let filetype = fs
            .superblock()
            .has_incompat(IncompatibleFeatureSet::FILETYPE);

        if self.0.inode.has_flag(InodeFlags::INDEX) {
            let root_blk = *blocks.first().ok_or_else(|| {
                Ext4Error::Corruption(format!(
                    "hash-tree directory {} has no data block",
                    self.0.path
                ))
            })?;
            let root = DxRoot::decode(&fs.read_block(root_blk)?)?;

            if root.info.indirect_levels > 0 {
                return Err(Ext4Error::Unsupported(
                    "multi-level hash-tree directories",
                ));
            }

            return Ok(DirEntries::new(fs, blocks, filetype).skipping_index_root());
        }

        Ok(DirEntries::new(fs, blocks, filetype))
    }

    /// Looks `name` up in this directory by linear scan, comparing raw
    /// name bytes.
    pub fn lookup(&self, fs: &Ext4Fs, name: &[u8]) -> Ext4Result<Option<Ext4DirEntry>> {
        for entry in self.entries(fs)? {
            let entry = entry?;
            if entry.name.as_bytes() == name {
                return Ok(Some(entry));
            }
        }

        Ok(None)
    }
}

/// A symbolic link.
#[derive(Clone, Debug)]
pub struct SymbolicLink(FileMeta);

impl SymbolicLink {
    file_variant_accessors!();

    /// The target path of this link.
    ///
    /// Fast symlinks keep the target inside the inode's `i_block` area;
    /// longer targets go through the content map.
    pub fn target(&self, fs: &Ext4Fs) -> Ext4Result<String> {
        let size = self.size();

        let raw = if size < FAST_SYMLINK_MAX_LEN {
            let i_block = self.0.inode.i_block;
            i_block[..size as usize].to_vec()
        } else {
            self.content(fs)?.read(fs, 0, size)?
        };

        String::from_utf8(raw).map_err(|_| {
            Ext4Error::Decoding(format!(
                "symbolic link target of {} is not valid UTF-8",
                self.0.path
            ))
        })
    }
}

/// A FIFO, character device, block device or socket: an inode with no data
/// blocks of its own.
#[derive(Clone, Debug)]
pub struct SpecialFile(FileMeta);

impl SpecialFile {
    file_variant_accessors!();
}

/// How an inode maps its logical blocks to physical blocks.
#[derive(Clone, Debug)]
enum ContentMap {
    /// Depth-0 extent tree: each leaf covers a run of contiguous blocks.
    Extents(Vec<Extent>),

    /// Legacy direct pointers, already truncated at the first hole.
    Direct(Vec<u64>),
}

/// The resolved logical-to-physical data map of one inode.
///
/// [`FileContent::block_numbers`] is a lazy, restartable sequence with
/// exactly `ceil(size / block_size)` elements for a fully-mapped file.
#[derive(Clone, Debug)]
pub struct FileContent {
    map: ContentMap,
    size: u64,
    block_size: u64,
}

impl FileContent {
    /// Interprets the `i_block` area of `inode` according to its flags.
    ///
    /// Fails with [`Ext4Error::Unsupported`] for inline data, uninitialised
    /// extents, extent trees deeper than the inode root, and legacy
    /// indirect addressing.
    pub fn new(fs: &Ext4Fs, inode: &Inode) -> Ext4Result<Self> {
        let sb = fs.superblock();
        let block_size = sb.blk_size();
        let size = inode.size();

        if inode.has_flag(InodeFlags::INLINE_DATA) {
            return Err(Ext4Error::Unsupported("inline data"));
        }

        let map = if inode.uses_extent_tree() {
            if !sb.has_incompat(IncompatibleFeatureSet::EXTENTS) {
                return Err(Ext4Error::Corruption(
                    "inode uses extents on a filesystem without the extents feature".into(),
                ));
            }

            let i_block = inode.i_block;
            ContentMap::Extents(parse_inode_extents(&i_block, sb.blk_count())?)
        } else {
            ContentMap::Direct(Self::parse_direct_map(inode, size, block_size, sb.blk_count())?)
        };

        Ok(Self {
            map,
            size,
            block_size,
        })
    }

    /// Decodes the legacy block map: twelve direct pointers, terminated by
    /// the first zero entry.
    fn parse_direct_map(
        inode: &Inode,
        size: u64,
        block_size: u64,
        blk_count: u64,
    ) -> Ext4Result<Vec<u64>> {
        let i_block = inode.i_block;
        let needed = size.div_ceil(block_size);

        let mut blocks = Vec::new();
        for slot in 0..12 {
            let raw: [u8; 4] = i_block[slot * 4..(slot + 1) * 4].try_into().unwrap();
            let blk = u64::from(u32::from_le_bytes(raw));

            if blk == 0 {
                return Ok(blocks);
            }
            if blk >= blk_count {
                return Err(Ext4Error::Corruption(format!(
                    "direct block pointer {blk:#x} past the end of the filesystem"
                )));
            }

            blocks.push(blk);
        }

        if needed > 12 {
            return Err(Ext4Error::Unsupported("indirect block addressing"));
        }

        Ok(blocks)
    }

    /// Size of the mapped file, in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The physical block numbers holding this file's data, in logical
    /// order.
    ///
    /// The sequence is lazy, finite and restartable; its length is bounded
    /// by `ceil(size / block_size)`.
    #[must_use]
    pub fn block_numbers(&self) -> BlockNumbers<'_> {
        BlockNumbers {
            map: &self.map,
            remaining: self.size.div_ceil(self.block_size),
            extent: 0,
            within: 0,
        }
    }

    /// Reads the byte range `[start, end)` of the file.
    ///
    /// Whole blocks are fetched and the edges trimmed. The range end is
    /// clamped to the file size; blocks the map does not cover (holes) read
    /// as zeroes.
    pub fn read(&self, fs: &Ext4Fs, start: u64, end: u64) -> Ext4Result<Vec<u8>> {
        if start > end {
            return Err(Ext4Error::Argument(format!(
                "invalid byte range: {start}..{end}"
            )));
        }

        let end = u64::min(end, self.size);
        if start >= end {
            return Ok(Vec::new());
        }

        let first_blk = start / self.block_size;
        let last_blk = (end - 1) / self.block_size;
        let span = usize::try_from((last_blk - first_blk + 1) * self.block_size)
            .map_err(|_| Ext4Error::Argument(format!("byte range too large: {start}..{end}")))?;

        let mut data = vec![0u8; span];
        for (i, blk_no) in self
            .block_numbers()
            .skip(first_blk as usize)
            .take((last_blk - first_blk + 1) as usize)
            .enumerate()
        {
            let offset = i * self.block_size as usize;
            data[offset..offset + self.block_size as usize]
                .copy_from_slice(&fs.read_block(blk_no)?);
        }

        let trim_start = (start - first_blk * self.block_size) as usize;
        let trim_end = (end - first_blk * self.block_size) as usize;

        Ok(data[trim_start..trim_end].to_vec())
    }
}

/// Lazy iterator over the physical block numbers of a [`FileContent`].
pub struct BlockNumbers<'c> {
    map: &'c ContentMap,
    remaining: u64,
    extent: usize,
    within: u64,
}

impl Iterator for BlockNumbers<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        match self.map {
            ContentMap::Extents(extents) => loop {
                let extent = extents.get(self.extent)?;

                if self.within < u64::from(extent.len()) {
                    let blk = extent.start_blk() + self.within;
                    self.within += 1;
                    self.remaining -= 1;
                    return Some(blk);
                }

                self.extent += 1;
                self.within = 0;
            },
            ContentMap::Direct(blocks) => {
                let blk = *blocks.get(self.extent)?;
                self.extent += 1;
                self.remaining -= 1;
                Some(blk)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::EXTENT_MAX_INIT_LEN;

    fn content_with_extents(entries: &[(u32, u16, u64)], size: u64, block_size: u64) -> FileContent {
        let extents = entries
            .iter()
            .map(|&(block, len, start)| Extent {
                ee_block: block,
                ee_len: len,
                ee_start_hi: (start >> 32) as u16,
                ee_start_lo: start as u32,
            })
            .collect();

        FileContent {
            map: ContentMap::Extents(extents),
            size,
            block_size,
        }
    }

    #[test]
    fn extent_runs_expand_to_consecutive_blocks() {
        let content = content_with_extents(&[(0, 3, 100), (3, 2, 500)], 5 * 1024, 1024);
        let blocks: Vec<u64> = content.block_numbers().collect();
        assert_eq!(blocks, vec![100, 101, 102, 500, 501]);
    }

    #[test]
    fn block_sequence_is_restartable() {
        let content = content_with_extents(&[(0, 2, 10)], 2048, 1024);
        assert_eq!(content.block_numbers().count(), 2);
        assert_eq!(content.block_numbers().count(), 2);
    }

    #[test]
    fn block_sequence_is_capped_by_file_size() {
        // Two mapped blocks but only 100 bytes of file.
        let content = content_with_extents(&[(0, 2, 10)], 100, 1024);
        let blocks: Vec<u64> = content.block_numbers().collect();
        assert_eq!(blocks, vec![10]);
    }

    #[test]
    fn zero_length_file_has_no_blocks() {
        let content = content_with_extents(&[], 0, 1024);
        assert_eq!(content.block_numbers().count(), 0);
    }

    #[test]
    fn direct_map_stops_at_first_hole() {
        let mut inode_raw = [0u8; crate::inode::INODE_STRUCT_SIZE];
        // i_block starts at 0x28: blocks 7, 9, then a hole.
        inode_raw[0x28..0x2C].copy_from_slice(&7u32.to_le_bytes());
        inode_raw[0x2C..0x30].copy_from_slice(&9u32.to_le_bytes());
        let inode = Inode::decode(&inode_raw);

        let blocks = FileContent::parse_direct_map(&inode, 4 * 1024, 1024, 1 << 20).unwrap();
        assert_eq!(blocks, vec![7, 9]);
    }

    #[test]
    fn files_needing_indirection_are_unsupported() {
        let mut inode_raw = [0u8; crate::inode::INODE_STRUCT_SIZE];
        for slot in 0..12u32 {
            let off = 0x28 + (slot as usize) * 4;
            inode_raw[off..off + 4].copy_from_slice(&(slot + 1).to_le_bytes());
        }
        let inode = Inode::decode(&inode_raw);

        assert!(matches!(
            FileContent::parse_direct_map(&inode, 13 * 1024, 1024, 1 << 20),
            Err(Ext4Error::Unsupported("indirect block addressing"))
        ));
    }

    #[test]
    fn oversized_extent_length_is_rejected_at_parse() {
        let mut root = [0u8; 60];
        root[0..2].copy_from_slice(&crate::extent::EXTENT_HEADER_MAGIC.to_le_bytes());
        root[2..4].copy_from_slice(&1u16.to_le_bytes());
        root[12..16].copy_from_slice(&0u32.to_le_bytes());
        root[16..18].copy_from_slice(&(EXTENT_MAX_INIT_LEN + 1).to_le_bytes());
        root[20..24].copy_from_slice(&1u32.to_le_bytes());

        assert!(matches!(
            parse_inode_extents(&root, u64::MAX),
            Err(Ext4Error::Unsupported("uninitialised extents"))
        ));
    }
}
