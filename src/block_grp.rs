//! ext4 block group related structures.
//!
//! Block groups are a logical grouping of contiguous blocks on disk. Each
//! group has a descriptor recording where its bookkeeping structures (block
//! bitmap, inode bitmap, inode table) live. Descriptors are 32 bytes on
//! classic filesystems and grow to 64 bytes under the 64-bit feature, the
//! upper half carrying the high bits of every base field.

use std::fmt::{self, Display, Formatter};

use bytemuck::{bytes_of, from_bytes, Pod, Zeroable};

use crate::csum::{crc16, crc32c, CRC16_INIT, CRC32C_INIT};
use crate::error::{Ext4Error, Ext4Result};
use crate::ext4_flag_field;
use crate::sb::{ReadOnlyCompatibleFeatureSet, Superblock};

/// On-disk width of a 64-bit block group descriptor, in bytes.
pub const BGD_SIZE_64: usize = 64;

/// Byte offset of the `checksum` field inside a descriptor; the low half of
/// the descriptor before it is always covered by the checksum.
const BGD_CHECKSUM_OFFSET: usize = 0x1E;

/// A number identifying a block group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct BlockGroupNumber(pub u32);

impl Display for BlockGroupNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl BlockGroupNumber {
    /// First block group of a filesystem.
    pub const INITIAL_BLK_GRP: Self = Self(0);

    /// Checks whether this group holds a backup copy of the superblock.
    ///
    /// With `sparse_super` set, backups only live in group 0 and in groups
    /// whose number is a power of 3, 5 or 7 (tested by the modular identity
    /// `p^k mod g == 0` for an exponent large enough to cover every 32-bit
    /// group number). Without it, every group has one.
    #[must_use]
    pub fn holds_backup_superblock(self, sparse_super: bool) -> bool {
        if !sparse_super {
            return true;
        }

        if self.0 == 0 {
            return true;
        }

        let g = u64::from(self.0);
        3u64.pow(20) % g == 0 || 5u64.pow(13) % g == 0 || 7u64.pow(11) % g == 0
    }
}

ext4_flag_field!(
    GroupDescriptorFlags,
    u16,
    "Block group state flags, set by the allocator."
);

impl GroupDescriptorFlags {
    /// Inode table and bitmap are not initialized.
    pub const INODE_UNINIT: Self = Self(0x0001);

    /// Block bitmap is not initialized.
    pub const BLOCK_UNINIT: Self = Self(0x0002);

    /// Inode table is zeroed.
    pub const INODE_ZEROED: Self = Self(0x0004);
}

/// Each block group on the filesystem has a `GroupDescriptor` associated
/// with it.
///
/// The structure below is the 64-byte variant; the classic 32-byte variant
/// is decoded into it with the upper half zeroed, so the lo/hi address
/// compositions hold for both.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct GroupDescriptor {
    /// Location of block bitmap, low 32 bits
    pub block_bitmap_lo: u32,

    /// Location of inode bitmap, low 32 bits
    pub inode_bitmap_lo: u32,

    /// Location of inode table, low 32 bits
    pub inode_table_lo: u32,

    /// Free block count, low 16 bits
    pub free_blocks_count_lo: u16,

    /// Free inode count, low 16 bits
    pub free_inodes_count_lo: u16,

    /// Directory count, low 16 bits
    pub used_dirs_count_lo: u16,

    /// Block group flags
    pub flags: GroupDescriptorFlags,

    /// Location of snapshot exclusion bitmap, low 32 bits
    pub exclude_bitmap_lo: u32,

    /// Block bitmap checksum, low 16 bits
    pub block_bitmap_csum_lo: u16,

    /// Inode bitmap checksum, low 16 bits
    pub inode_bitmap_csum_lo: u16,

    /// Unused inode count, low 16 bits
    pub itable_unused_lo: u16,

    /// Group descriptor checksum
    pub checksum: u16,

    /// Location of block bitmap, high 32 bits
    pub block_bitmap_hi: u32,

    /// Location of inode bitmap, high 32 bits
    pub inode_bitmap_hi: u32,

    /// Location of inode table, high 32 bits
    pub inode_table_hi: u32,

    /// Free block count, high 16 bits
    pub free_blocks_count_hi: u16,

    /// Free inode count, high 16 bits
    pub free_inodes_count_hi: u16,

    /// Directory count, high 16 bits
    pub used_dirs_count_hi: u16,

    /// Unused inode count, high 16 bits
    pub itable_unused_hi: u16,

    /// Location of snapshot exclusion bitmap, high 32 bits
    pub exclude_bitmap_hi: u32,

    /// Block bitmap checksum, high 16 bits
    pub block_bitmap_csum_hi: u16,

    /// Inode bitmap checksum, high 16 bits
    pub inode_bitmap_csum_hi: u16,

    pub reserved: u32,
}

const _: () = assert!(core::mem::size_of::<GroupDescriptor>() == BGD_SIZE_64);

impl GroupDescriptor {
    /// Decodes a `GroupDescriptor` from its raw on-disk bytes.
    ///
    /// Accepts either the 32-byte or the 64-byte variant; shorter input is
    /// zero-extended so the `*_hi` fields of a classic descriptor read as
    /// zero.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        let mut filled = [0u8; BGD_SIZE_64];
        let len = usize::min(bytes.len(), BGD_SIZE_64);
        filled[..len].copy_from_slice(&bytes[..len]);

        *from_bytes(&filled)
    }

    /// Returns the physical block address of the block bitmap of this
    /// group.
    #[must_use]
    pub fn block_bitmap_blk_addr(&self) -> u64 {
        u64::from(self.block_bitmap_lo) | (u64::from(self.block_bitmap_hi) << 32)
    }

    /// Returns the physical block address of the inode bitmap of this
    /// group.
    #[must_use]
    pub fn inode_bitmap_blk_addr(&self) -> u64 {
        u64::from(self.inode_bitmap_lo) | (u64::from(self.inode_bitmap_hi) << 32)
    }

    /// Returns the physical block address of the inode table of this group.
    #[must_use]
    pub fn inode_table_blk_addr(&self) -> u64 {
        u64::from(self.inode_table_lo) | (u64::from(self.inode_table_hi) << 32)
    }

    /// Returns the count of free blocks in this block group.
    #[must_use]
    pub fn free_blk_count(&self) -> u32 {
        u32::from(self.free_blocks_count_lo) | (u32::from(self.free_blocks_count_hi) << 16)
    }

    /// Returns the count of free inodes in this block group.
    #[must_use]
    pub fn free_inode_count(&self) -> u32 {
        u32::from(self.free_inodes_count_lo) | (u32::from(self.free_inodes_count_hi) << 16)
    }

    /// Returns the count of directories that belong to this block group.
    #[must_use]
    pub fn directory_count(&self) -> u32 {
        u32::from(self.used_dirs_count_lo) | (u32::from(self.used_dirs_count_hi) << 16)
    }

    /// Returns the number of unused entries in the inode table of this
    /// block group.
    #[must_use]
    pub fn unused_inodes_count(&self) -> u32 {
        u32::from(self.itable_unused_lo) | (u32::from(self.itable_unused_hi) << 16)
    }

    /// Compares the checksum of the `GroupDescriptor` to its on-disk value.
    ///
    /// The CRC input is `uuid ‖ group_le32 ‖ descriptor[0..0x1E]`, extended
    /// in 64-bit mode with a zeroed checksum placeholder and the upper half
    /// of the descriptor. `metadata_csum` selects CRC-32C (low 16 bits
    /// kept), the legacy `gdt_csum` feature selects CRC-16; a filesystem
    /// carrying neither has no known checksum method.
    pub fn verify_checksum(&self, sb: &Superblock, group: BlockGroupNumber) -> Ext4Result<()> {
        let uuid = sb.uuid;
        let desc_bytes = bytes_of(self);
        // The decoded descriptor holds the 64 bytes the checksum can cover;
        // larger on-disk descriptors pad with reserved space.
        let desc_size = usize::min(sb.bgd_size() as usize, BGD_SIZE_64);

        let mut input = Vec::with_capacity(uuid.len() + 4 + desc_size);
        input.extend_from_slice(&uuid);
        input.extend_from_slice(&group.0.to_le_bytes());
        input.extend_from_slice(&desc_bytes[..BGD_CHECKSUM_OFFSET]);
        if desc_size > 32 {
            input.extend_from_slice(&[0u8; 2]);
            input.extend_from_slice(&desc_bytes[0x20..desc_size]);
        }

        let computed = if sb.has_metadata_csum() {
            (crc32c(&input, CRC32C_INIT) & 0xFFFF) as u16
        } else if sb.has_ro_compat(ReadOnlyCompatibleFeatureSet::GDT_CSUM) {
            crc16(&input, CRC16_INIT)
        } else {
            return Err(Ext4Error::Corruption(format!(
                "unknown checksum method for block group descriptor {group}"
            )));
        };

        let stored = self.checksum;
        if computed != stored {
            log::error!(
                "invalid block group descriptor checksum (bg {group}, got {computed:#06x} \
                 expected {stored:#06x})"
            );
            return Err(Ext4Error::Corruption(format!(
                "block group descriptor {group} checksum mismatch (got {computed:#06x} \
                 expected {stored:#06x})"
            )));
        }

        Ok(())
    }
}
