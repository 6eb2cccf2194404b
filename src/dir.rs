//! `ext4` directory-related structures.
//!
//! A directory is a file whose data blocks hold a packed list of entries
//! mapping names to inode numbers. Two entry layouts exist: the classic one
//! (v1, 16-bit name length) and the `filetype` one (v2, 8-bit name length
//! plus a file type byte), selected filesystem-wide by the
//! `INCOMPAT_FILETYPE` feature.
//!
//! Hash-tree indexed directories (inode flag `INDEX`) disguise their index
//! root as oversized entries in block 0; the index is treated as advisory
//! and the remaining data blocks are scanned linearly.

use std::fmt::{self, Display, Formatter};

use bytemuck::{from_bytes, Pod, Zeroable};

use crate::error::{Ext4Error, Ext4Result};
use crate::inode::InodeNumber;
use crate::Ext4Fs;

/// Width of the fixed part of a directory entry, before the name bytes.
pub const DIR_ENTRY_HEADER_SIZE: usize = 8;

/// Byte offset of the hash-tree root info inside block 0 of an indexed
/// directory (right after the dot and dotdot pseudo-entries).
const DX_ROOT_INFO_OFFSET: usize = 0x18;

/// File type code carried by v2 directory entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct DirEntryFileType(pub u8);

impl DirEntryFileType {
    pub const UNKNOWN: Self = Self(0);

    pub const REGULAR: Self = Self(0x1);

    pub const DIRECTORY: Self = Self(0x2);

    pub const CHAR_DEVICE: Self = Self(0x3);

    pub const BLOCK_DEVICE: Self = Self(0x4);

    pub const FIFO: Self = Self(0x5);

    pub const SOCKET: Self = Self(0x6);

    pub const SYMLINK: Self = Self(0x7);
}

/// File name associated to a directory entry.
///
/// On disk this is a raw byte string; [`Ext4Filename::as_str`] interprets
/// it as UTF-8.
#[derive(Clone, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Ext4Filename(pub Vec<u8>);

impl Ext4Filename {
    /// The raw name bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The name as UTF-8, failing with [`Ext4Error::Decoding`] on malformed
    /// bytes.
    pub fn as_str(&self) -> Ext4Result<&str> {
        std::str::from_utf8(&self.0).map_err(|_| {
            Ext4Error::Decoding(format!(
                "directory entry name is not valid UTF-8: {:x?}",
                self.0
            ))
        })
    }

    /// Hidden files start with a dot.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.0.first() == Some(&b'.')
    }
}

impl From<&str> for Ext4Filename {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl Display for Ext4Filename {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&String::from_utf8_lossy(&self.0), f)
    }
}

/// A decoded directory entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ext4DirEntry {
    /// Inode the entry points to.
    pub inode_no: InodeNumber,

    /// Stride to the next entry within the directory block.
    pub rec_len: u16,

    /// File type of the entry; only present on `filetype` (v2) layouts.
    pub file_type: Option<DirEntryFileType>,

    /// Name of the entry.
    pub name: Ext4Filename,
}

impl Ext4DirEntry {
    /// Decodes one directory entry at `offset` inside a directory data
    /// block.
    ///
    /// `filetype` selects the v2 layout. The stride invariants are
    /// enforced here: `0 < rec_len ≤ block_size − offset`, 4-byte aligned,
    /// and large enough to contain the name.
    pub fn decode(block: &[u8], offset: usize, filetype: bool) -> Ext4Result<Self> {
        let bytes = &block[offset..];
        if bytes.len() < DIR_ENTRY_HEADER_SIZE {
            return Err(Ext4Error::Corruption(format!(
                "truncated directory entry at block offset {offset:#x}"
            )));
        }

        let inode_no = InodeNumber(u32::from_le_bytes(bytes[..4].try_into().unwrap()));
        let rec_len = u16::from_le_bytes(bytes[4..6].try_into().unwrap());

        if rec_len == 0 || rec_len % 4 != 0 || usize::from(rec_len) > bytes.len() {
            return Err(Ext4Error::Corruption(format!(
                "invalid directory entry stride {rec_len} at block offset {offset:#x}"
            )));
        }

        let (name_len, file_type) = if filetype {
            (usize::from(bytes[6]), Some(DirEntryFileType(bytes[7])))
        } else {
            (
                usize::from(u16::from_le_bytes(bytes[6..8].try_into().unwrap())),
                None,
            )
        };

        if DIR_ENTRY_HEADER_SIZE + name_len > usize::from(rec_len) {
            return Err(Ext4Error::Corruption(format!(
                "directory entry name overruns its stride at block offset {offset:#x}"
            )));
        }

        let name = Ext4Filename(
            bytes[DIR_ENTRY_HEADER_SIZE..DIR_ENTRY_HEADER_SIZE + name_len].to_vec(),
        );

        Ok(Self {
            inode_no,
            rec_len,
            file_type,
            name,
        })
    }
}

/// Root information of a hash-tree indexed directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C, packed)]
pub struct DxRootInfo {
    pub reserved_zero: u32,

    /// Hash algorithm used for the index
    pub hash_version: u8,

    /// Length of this info block (8)
    pub info_length: u8,

    /// Depth of the index tree below the root
    pub indirect_levels: u8,

    pub unused_flags: u8,
}

/// One entry of the hash-tree index: a hash lower bound and the directory
/// block holding the matching entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C, packed)]
pub struct DxEntry {
    pub hash: u32,
    pub block: u32,
}

/// The decoded root (block 0) of a hash-tree indexed directory.
///
/// The dot and dotdot entries open the block disguised as ordinary
/// directory entries, followed by [`DxRootInfo`] and a count-limited table
/// of [`DxEntry`].
#[derive(Clone, Debug)]
pub struct DxRoot {
    pub info: DxRootInfo,

    /// Maximum number of index entries that fit the root
    pub limit: u16,

    /// Number of index entries in use
    pub count: u16,

    /// Directory block referenced by hashes below the first indexed one
    pub block: u32,

    /// The index entries proper.
    pub entries: Vec<DxEntry>,
}

impl DxRoot {
    /// Decodes the root of a hash-tree index from block 0 of a directory.
    pub fn decode(block: &[u8]) -> Ext4Result<Self> {
        let info_end = DX_ROOT_INFO_OFFSET + core::mem::size_of::<DxRootInfo>();
        if block.len() < info_end + 8 {
            return Err(Ext4Error::Corruption(
                "hash-tree directory root block is too short".into(),
            ));
        }

        let info: DxRootInfo = *from_bytes(&block[DX_ROOT_INFO_OFFSET..info_end]);
        let limit = u16::from_le_bytes(block[info_end..info_end + 2].try_into().unwrap());
        let count = u16::from_le_bytes(block[info_end + 2..info_end + 4].try_into().unwrap());
        let blk = u32::from_le_bytes(block[info_end + 4..info_end + 8].try_into().unwrap());

        if count > limit {
            return Err(Ext4Error::Corruption(format!(
                "hash-tree root declares {count} entries with a limit of {limit}"
            )));
        }

        let mut entries = Vec::with_capacity(usize::from(count.saturating_sub(1)));
        let mut offset = info_end + 8;
        // The (hash, block) pair decoded above counts as the first entry.
        for _ in 1..count {
            if block.len() < offset + 8 {
                return Err(Ext4Error::Corruption(
                    "hash-tree index table overruns its block".into(),
                ));
            }
            entries.push(*from_bytes::<DxEntry>(&block[offset..offset + 8]));
            offset += 8;
        }

        Ok(Self {
            info,
            limit,
            count,
            block: blk,
            entries,
        })
    }
}

/// A lazy, restartable iterator over the entries of a directory.
///
/// Entries come out in on-disk order: blocks in extent order, entries in
/// their order within each block. A zero inode number ends the scan of the
/// current block; reaching the block size moves to the next one.
pub struct DirEntries<'fs> {
    fs: &'fs Ext4Fs,
    blocks: Vec<u64>,
    filetype: bool,
    next_block: usize,
    current: Option<Vec<u8>>,
    offset: usize,
    failed: bool,
}

impl<'fs> DirEntries<'fs> {
    pub(crate) fn new(fs: &'fs Ext4Fs, blocks: Vec<u64>, filetype: bool) -> Self {
        Self {
            fs,
            blocks,
            filetype,
            next_block: 0,
            current: None,
            offset: 0,
            failed: false,
        }
    }

    /// Skips the first data block (the root of a hash-tree index).
    pub(crate) fn skipping_index_root(mut self) -> Self {
        self.next_block = 1;
        self
    }
}

impl Iterator for DirEntries<'_> {
    type Item = Ext4Result<Ext4DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let block_size = self.fs.superblock().blk_size() as usize;

        loop {
            // Load a data block if none is under scan.
            if self.current.is_none() {
                let blk_no = *self.blocks.get(self.next_block)?;
                self.next_block += 1;

                match self.fs.read_block(blk_no) {
                    Ok(data) => {
                        self.current = Some(data);
                        self.offset = 0;
                    }
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
            }

            let block = self.current.as_ref().unwrap();

            if self.offset >= block_size {
                self.current = None;
                continue;
            }

            match Ext4DirEntry::decode(block, self.offset, self.filetype) {
                Ok(entry) => {
                    if entry.inode_no == InodeNumber::UNUSED_DIR_ENTRY {
                        // Unused slot: the rest of the block holds no
                        // further entries.
                        self.current = None;
                        continue;
                    }

                    self.offset += usize::from(entry.rec_len);
                    return Some(Ok(entry));
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_bytes(inode: u32, rec_len: u16, name: &[u8], file_type: u8) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&inode.to_le_bytes());
        bytes.extend_from_slice(&rec_len.to_le_bytes());
        bytes.push(name.len() as u8);
        bytes.push(file_type);
        bytes.extend_from_slice(name);
        bytes.resize(usize::from(rec_len), 0);
        bytes
    }

    #[test]
    fn decodes_v2_entries() {
        let block = entry_bytes(12, 20, b"hello.txt", 0x1);
        let entry = Ext4DirEntry::decode(&block, 0, true).unwrap();

        assert_eq!(entry.inode_no, InodeNumber(12));
        assert_eq!(entry.rec_len, 20);
        assert_eq!(entry.file_type, Some(DirEntryFileType::REGULAR));
        assert_eq!(entry.name.as_str().unwrap(), "hello.txt");
    }

    #[test]
    fn decodes_v1_entries() {
        // v1: 16-bit name_len, no file type byte.
        let mut block = Vec::new();
        block.extend_from_slice(&7u32.to_le_bytes());
        block.extend_from_slice(&16u16.to_le_bytes());
        block.extend_from_slice(&3u16.to_le_bytes());
        block.extend_from_slice(b"usr");
        block.resize(16, 0);

        let entry = Ext4DirEntry::decode(&block, 0, false).unwrap();
        assert_eq!(entry.inode_no, InodeNumber(7));
        assert_eq!(entry.file_type, None);
        assert_eq!(entry.name.as_str().unwrap(), "usr");
    }

    #[test]
    fn zero_stride_is_corruption() {
        let block = entry_bytes(12, 12, b"x", 0x1);
        let mut bad = block.clone();
        bad[4..6].copy_from_slice(&0u16.to_le_bytes());

        assert!(matches!(
            Ext4DirEntry::decode(&bad, 0, true),
            Err(Ext4Error::Corruption(_))
        ));
    }

    #[test]
    fn unaligned_stride_is_corruption() {
        let mut block = entry_bytes(12, 16, b"x", 0x1);
        block[4..6].copy_from_slice(&14u16.to_le_bytes());

        assert!(matches!(
            Ext4DirEntry::decode(&block, 0, true),
            Err(Ext4Error::Corruption(_))
        ));
    }

    #[test]
    fn stride_past_block_end_is_corruption() {
        let block = entry_bytes(12, 16, b"x", 0x1);
        let mut bad = block.clone();
        bad[4..6].copy_from_slice(&64u16.to_le_bytes());

        assert!(matches!(
            Ext4DirEntry::decode(&bad, 0, true),
            Err(Ext4Error::Corruption(_))
        ));
    }

    #[test]
    fn name_overrun_is_corruption() {
        let mut block = entry_bytes(12, 12, b"abc", 0x1);
        block[6] = 10; // name_len past rec_len

        assert!(matches!(
            Ext4DirEntry::decode(&block, 0, true),
            Err(Ext4Error::Corruption(_))
        ));
    }

    #[test]
    fn malformed_name_is_a_decoding_error() {
        let entry = Ext4DirEntry {
            inode_no: InodeNumber(3),
            rec_len: 16,
            file_type: None,
            name: Ext4Filename(vec![0xFF, 0xFE]),
        };

        assert!(matches!(
            entry.name.as_str(),
            Err(Ext4Error::Decoding(_))
        ));
    }

    #[test]
    fn dx_root_decoding() {
        let mut block = vec![0u8; 1024];
        // dot / dotdot pseudo-entries are irrelevant to the decoder.
        let info_end = DX_ROOT_INFO_OFFSET + 8;
        block[DX_ROOT_INFO_OFFSET + 5] = 8; // info_length
        block[DX_ROOT_INFO_OFFSET + 6] = 0; // indirect_levels
        block[info_end..info_end + 2].copy_from_slice(&124u16.to_le_bytes());
        block[info_end + 2..info_end + 4].copy_from_slice(&2u16.to_le_bytes());
        block[info_end + 4..info_end + 8].copy_from_slice(&1u32.to_le_bytes());
        // Second index entry.
        block[info_end + 8..info_end + 12].copy_from_slice(&0x8000_0000u32.to_le_bytes());
        block[info_end + 12..info_end + 16].copy_from_slice(&2u32.to_le_bytes());

        let root = DxRoot::decode(&block).unwrap();
        assert_eq!(root.count, 2);
        assert_eq!(root.block, 1);
        assert_eq!(root.entries.len(), 1);
        assert_eq!({ root.entries[0].block }, 2);

        // An over-limit count is rejected.
        block[info_end + 2..info_end + 4].copy_from_slice(&200u16.to_le_bytes());
        assert!(matches!(
            DxRoot::decode(&block),
            Err(Ext4Error::Corruption(_))
        ));
    }
}
