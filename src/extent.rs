//! ext4 extent-tree decoding.
//!
//! Extent trees replace the legacy block map with indirect pointers: each
//! leaf maps a run of contiguous logical blocks to a run of contiguous
//! physical blocks. Every node starts with a 12-byte header followed by
//! 12-byte entries, leaves when `eh_depth == 0` and index nodes otherwise.
//!
//! Only depth-0 trees (the root embedded in the inode's 60-byte `i_block`
//! area, up to four leaf entries) are walked; deeper trees are reserved.

use bytemuck::{from_bytes, Pod, Zeroable};

use crate::error::{Ext4Error, Ext4Result};

/// Magic number opening every extent tree node.
pub const EXTENT_HEADER_MAGIC: u16 = 0xF30A;

/// Width of an extent node header, in bytes.
pub const EXTENT_HEADER_SIZE: usize = 12;

/// Width of an extent node entry (leaf or index), in bytes.
pub const EXTENT_ENTRY_SIZE: usize = 12;

/// An initialised extent covers at most this many blocks; larger `ee_len`
/// values encode uninitialised extents.
pub const EXTENT_MAX_INIT_LEN: u16 = 32768;

/// Header contained in each node of the `ext4` extent tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C, packed)]
pub struct ExtentHeader {
    /// Magic number (should be `0xF30A`)
    pub eh_magic: u16,

    /// Number of valid entries following the header
    pub eh_entries: u16,

    /// Maximum number of entries that could follow the header
    pub eh_max: u16,

    /// Depth of this node in the extent tree.
    ///
    /// If `eh_depth == 0`, the entries of this node point to data blocks.
    pub eh_depth: u16,

    /// Generation of the tree
    pub eh_generation: u32,
}

const _: () = assert!(core::mem::size_of::<ExtentHeader>() == EXTENT_HEADER_SIZE);

impl ExtentHeader {
    /// Decodes an `ExtentHeader` from raw bytes and checks its magic
    /// number.
    pub fn decode(bytes: &[u8]) -> Ext4Result<Self> {
        let mut filled = [0u8; EXTENT_HEADER_SIZE];
        let len = usize::min(bytes.len(), EXTENT_HEADER_SIZE);
        filled[..len].copy_from_slice(&bytes[..len]);

        let header: Self = *from_bytes(&filled);

        let magic = header.eh_magic;
        if magic != EXTENT_HEADER_MAGIC {
            return Err(Ext4Error::Corruption(format!(
                "invalid extent node magic {magic:#06x} (expected {EXTENT_HEADER_MAGIC:#06x})"
            )));
        }

        Ok(header)
    }

    /// Checks if the entries of this node are leaves.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        let depth = self.eh_depth;
        depth == 0
    }
}

/// A leaf node of the extent tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C, packed)]
pub struct Extent {
    /// First logical block number that this extent covers
    pub ee_block: u32,

    /// Number of blocks covered by the extent.
    ///
    /// If `ee_len > 32768`, the extent is uninitialised and the actual
    /// length is `ee_len - 32768`.
    pub ee_len: u16,

    /// High 16 bits of the physical block number to which this extent
    /// points
    pub ee_start_hi: u16,

    /// Low 32 bits of the physical block number to which this extent
    /// points
    pub ee_start_lo: u32,
}

const _: () = assert!(core::mem::size_of::<Extent>() == EXTENT_ENTRY_SIZE);

impl Extent {
    /// Decodes an `Extent` from raw bytes.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        let mut filled = [0u8; EXTENT_ENTRY_SIZE];
        let len = usize::min(bytes.len(), EXTENT_ENTRY_SIZE);
        filled[..len].copy_from_slice(&bytes[..len]);

        *from_bytes(&filled)
    }

    /// The first physical block this extent points to.
    #[must_use]
    pub fn start_blk(&self) -> u64 {
        u64::from(self.ee_start_lo) | (u64::from(self.ee_start_hi) << 32)
    }

    /// Checks if this extent is initialised.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        let len = self.ee_len;
        len <= EXTENT_MAX_INIT_LEN
    }

    /// The number of blocks covered by this extent, whether it is
    /// initialised or not.
    #[must_use]
    pub fn len(&self) -> u16 {
        let len = self.ee_len;
        if self.is_initialized() {
            len
        } else {
            len - EXTENT_MAX_INIT_LEN
        }
    }

    /// An extent covering no block at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An internal node of the extent tree (an index node).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C, packed)]
pub struct ExtentIdx {
    /// This index node covers logical blocks from `ei_block` onward
    pub ei_block: u32,

    /// Low 32 bits of the block number of the extent node one level lower
    /// in the tree
    pub ei_leaf_lo: u32,

    /// High 16 bits of the block number of the extent node one level lower
    /// in the tree
    pub ei_leaf_hi: u16,

    pub ei_unused: u16,
}

const _: () = assert!(core::mem::size_of::<ExtentIdx>() == EXTENT_ENTRY_SIZE);

impl ExtentIdx {
    /// The physical block holding the child node.
    #[must_use]
    pub fn leaf(&self) -> u64 {
        u64::from(self.ei_leaf_lo) | (u64::from(self.ei_leaf_hi) << 32)
    }
}

/// Parses the depth-0 extent tree rooted in an inode's 60-byte `i_block`
/// area.
///
/// The root holds a header followed by up to four leaf entries. Fails with:
/// - [`Ext4Error::Corruption`] on a bad node magic, an entry count that
///   does not fit the root, or a physical block past `blk_count`,
/// - [`Ext4Error::Unsupported`] for index nodes (`eh_depth > 0`) and
///   uninitialised extents.
pub fn parse_inode_extents(i_block: &[u8], blk_count: u64) -> Ext4Result<Vec<Extent>> {
    let header = ExtentHeader::decode(i_block)?;

    if !header.is_leaf() {
        return Err(Ext4Error::Unsupported(
            "multi-level extent trees (eh_depth > 0)",
        ));
    }

    let entries = header.eh_entries;
    let max_root_entries = ((i_block.len() - EXTENT_HEADER_SIZE) / EXTENT_ENTRY_SIZE) as u16;
    if entries > max_root_entries {
        return Err(Ext4Error::Corruption(format!(
            "extent root declares {entries} entries, at most {max_root_entries} fit"
        )));
    }

    let mut extents = Vec::with_capacity(usize::from(entries));
    for entry in 0..usize::from(entries) {
        let offset = EXTENT_HEADER_SIZE + entry * EXTENT_ENTRY_SIZE;
        let extent = Extent::decode(&i_block[offset..offset + EXTENT_ENTRY_SIZE]);

        if !extent.is_initialized() {
            return Err(Ext4Error::Unsupported("uninitialised extents"));
        }

        let last_blk = extent.start_blk() + u64::from(extent.len());
        if last_blk > blk_count {
            return Err(Ext4Error::Corruption(format!(
                "extent points past the end of the filesystem (block {:#x} of {blk_count:#x})",
                extent.start_blk()
            )));
        }

        extents.push(extent);
    }

    Ok(extents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_with(entries: &[(u32, u16, u64)]) -> [u8; 60] {
        let mut root = [0u8; 60];
        root[0..2].copy_from_slice(&EXTENT_HEADER_MAGIC.to_le_bytes());
        root[2..4].copy_from_slice(&(entries.len() as u16).to_le_bytes());
        root[4..6].copy_from_slice(&4u16.to_le_bytes());

        for (i, &(block, len, start)) in entries.iter().enumerate() {
            let off = EXTENT_HEADER_SIZE + i * EXTENT_ENTRY_SIZE;
            root[off..off + 4].copy_from_slice(&block.to_le_bytes());
            root[off + 4..off + 6].copy_from_slice(&len.to_le_bytes());
            root[off + 6..off + 8].copy_from_slice(&((start >> 32) as u16).to_le_bytes());
            root[off + 8..off + 12].copy_from_slice(&(start as u32).to_le_bytes());
        }

        root
    }

    #[test]
    fn parses_leaf_entries() {
        let root = root_with(&[(0, 2, 100), (2, 1, 500)]);
        let extents = parse_inode_extents(&root, 1024).unwrap();

        assert_eq!(extents.len(), 2);
        assert_eq!(extents[0].start_blk(), 100);
        assert_eq!(extents[0].len(), 2);
        assert_eq!(extents[1].start_blk(), 500);
    }

    #[test]
    fn composes_48_bit_start_addresses() {
        let root = root_with(&[(0, 1, 0x1_0000_0010)]);
        let extents = parse_inode_extents(&root, u64::MAX).unwrap();
        assert_eq!(extents[0].start_blk(), 0x1_0000_0010);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut root = root_with(&[(0, 1, 1)]);
        root[0] = 0;
        assert!(matches!(
            parse_inode_extents(&root, 1024),
            Err(Ext4Error::Corruption(_))
        ));
    }

    #[test]
    fn rejects_index_nodes() {
        let mut root = root_with(&[(0, 1, 1)]);
        root[6..8].copy_from_slice(&1u16.to_le_bytes()); // eh_depth
        assert!(matches!(
            parse_inode_extents(&root, 1024),
            Err(Ext4Error::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_uninitialised_extents() {
        // 32768 is still a valid initialised length, one more is not.
        let root = root_with(&[(0, EXTENT_MAX_INIT_LEN, 1)]);
        assert!(parse_inode_extents(&root, u64::MAX).is_ok());

        let root = root_with(&[(0, EXTENT_MAX_INIT_LEN + 1, 1)]);
        assert!(matches!(
            parse_inode_extents(&root, u64::MAX),
            Err(Ext4Error::Unsupported("uninitialised extents"))
        ));
    }

    #[test]
    fn rejects_out_of_bounds_blocks() {
        let root = root_with(&[(0, 4, 1022)]);
        assert!(matches!(
            parse_inode_extents(&root, 1024),
            Err(Ext4Error::Corruption(_))
        ));
    }

    #[test]
    fn rejects_overfull_root() {
        let mut root = root_with(&[(0, 1, 1)]);
        root[2..4].copy_from_slice(&5u16.to_le_bytes());
        assert!(matches!(
            parse_inode_extents(&root, 1024),
            Err(Ext4Error::Corruption(_))
        ));
    }
}
