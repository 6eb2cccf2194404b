//! ext4 Superblock related structures.
//!
//! The superblock stores various information about the filesystem (supported
//! features, block count, inode count, ...). It lives at absolute byte offset
//! `0x400` on the device, whatever the block size.
//!
//! Copies of the `Superblock` structure are kept in each block group, unless
//! the `sparse_super` feature is set in which case they are only kept in
//! block groups whose number is 0, or a power of 3, 5 or 7.

use bytemuck::{bytes_of, from_bytes, Pod, Zeroable};
use uuid::Uuid;

use crate::csum::{crc32c, CRC32C_INIT};
use crate::error::{Ext4Error, Ext4Result};

/// `ext4` magic signature, at offset `0x38` of the superblock.
pub const EXT4_SIGNATURE: u16 = 0xEF53;

/// Absolute byte offset of the superblock on the device.
pub const SUPERBLOCK_OFFSET: u64 = 0x400;

/// On-disk width of the superblock, in bytes.
pub const SUPERBLOCK_SIZE: usize = 1024;

/// Byte offset of the `checksum` field; the superblock checksum covers
/// everything before it.
const SUPERBLOCK_CHECKSUM_OFFSET: usize = 0x3FC;

/// Defines a standard structure for feature-flag fields of the
/// [`Superblock`].
#[macro_export]
macro_rules! ext4_flag_field {
    ($struct_name: tt, $size: ident, $desc: literal) => {
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable,
        )]
        #[repr(transparent)]
        #[doc=$desc]
        pub struct $struct_name(pub $size);

        impl core::ops::BitAnd for $struct_name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self::Output {
                Self(self.0 & rhs.0)
            }
        }

        impl core::ops::BitOr for $struct_name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self::Output {
                Self(self.0 | rhs.0)
            }
        }

        impl core::ops::BitXor for $struct_name {
            type Output = Self;

            fn bitxor(self, rhs: Self) -> Self::Output {
                Self(self.0 ^ rhs.0)
            }
        }

        impl $struct_name {
            /// Checks if this set is a subset of (included in) the set passed
            /// as argument.
            pub fn is_subset_of(self, features: Self) -> bool {
                (self | features) ^ features == Self(0)
            }

            /// Checks if this set includes the set passed as argument.
            pub fn includes(self, features: Self) -> bool {
                features.is_subset_of(self)
            }
        }
    };
}

ext4_flag_field!(
    CompatibleFeatureSet,
    u32,
    "Compatible feature set flags. The system may still read from this \
filesystem even if it does not implement all flags defined in the superblock."
);

impl CompatibleFeatureSet {
    /// Directory preallocation.
    pub const DIR_PREALLOC: Self = Self(0x0001);

    /// Used by AFS to indicate inodes that are not linked into the directory
    /// namespace.
    pub const IMAGIC_INODES: Self = Self(0x0002);

    /// A journal file keeps the filesystem consistent across dirty
    /// shutdowns.
    pub const HAS_JOURNAL: Self = Self(0x0004);

    /// Extended attributes are in use.
    pub const EXT_ATTR: Self = Self(0x0008);

    /// Space is reserved so the block group descriptor table can grow while
    /// resizing a mounted filesystem.
    pub const RESIZE_INODE: Self = Self(0x0010);

    /// Hashed B-trees speed up name lookups in large directories.
    pub const DIR_INDEX: Self = Self(0x0020);

    /// At most 2 backup superblocks and block group descriptor tables.
    pub const SPARSE_SUPER2: Self = Self(0x0200);

    pub const FAST_COMMIT: Self = Self(0x0400);

    /// Marks the filesystem's inode numbers and UUID as stable.
    pub const STABLE_INODES: Self = Self(0x0800);

    pub const ORPHAN_FILE: Self = Self(0x1000);

    /// Names of the flags set, for display purposes.
    #[must_use]
    pub fn flag_names(self) -> Vec<&'static str> {
        const NAMES: [(CompatibleFeatureSet, &str); 10] = [
            (CompatibleFeatureSet::DIR_PREALLOC, "DIR_PREALLOC"),
            (CompatibleFeatureSet::IMAGIC_INODES, "IMAGIC_INODES"),
            (CompatibleFeatureSet::HAS_JOURNAL, "HAS_JOURNAL"),
            (CompatibleFeatureSet::EXT_ATTR, "EXT_ATTR"),
            (CompatibleFeatureSet::RESIZE_INODE, "RESIZE_INODE"),
            (CompatibleFeatureSet::DIR_INDEX, "DIR_INDEX"),
            (CompatibleFeatureSet::SPARSE_SUPER2, "SPARSE_SUPER2"),
            (CompatibleFeatureSet::FAST_COMMIT, "FAST_COMMIT"),
            (CompatibleFeatureSet::STABLE_INODES, "STABLE_INODES"),
            (CompatibleFeatureSet::ORPHAN_FILE, "ORPHAN_FILE"),
        ];

        NAMES
            .iter()
            .filter(|(flag, _)| self.includes(*flag))
            .map(|&(_, name)| name)
            .collect()
    }
}

ext4_flag_field!(
    IncompatibleFeatureSet,
    u32,
    "Incompatible feature set flags. The system should not mount the \
filesystem if it does not understand one of the incompatible feature flags \
defined in the superblock."
);

impl IncompatibleFeatureSet {
    /// Compression feature flag (not implemented).
    pub const COMPRESSION: Self = Self(0x0001);

    /// Directory entries store file type information ([`crate::dir`] v2
    /// entries).
    pub const FILETYPE: Self = Self(0x0002);

    /// File system needs journal recovery.
    pub const RECOVER: Self = Self(0x0004);

    /// Set on the superblock found on an external journal device.
    pub const JOURNAL_DEV: Self = Self(0x0008);

    /// Meta block groups: filesystems resizable on-line without reserving
    /// group descriptor space.
    pub const META_BG: Self = Self(0x0010);

    /// Logical-to-physical block maps are stored in extent trees rather than
    /// the traditional `ext2`/`ext3` indirect block scheme.
    pub const EXTENTS: Self = Self(0x0040);

    /// Filesystem size above 2^32 blocks; group descriptors grow to 64
    /// bytes.
    pub const SIXTY_FOUR_BIT: Self = Self(0x0080);

    /// Multiple mount protection.
    pub const MMP: Self = Self(0x0100);

    /// Per-block-group metadata is bundled into flex groups.
    pub const FLEX_BG: Self = Self(0x0200);

    /// Extended attribute values may live in the data blocks of a separate
    /// inode.
    pub const EA_INODE: Self = Self(0x0400);

    /// Data in directory entry.
    pub const DIRDATA: Self = Self(0x1000);

    /// The metadata checksum seed is stored in the superblock, allowing the
    /// UUID to change while mounted.
    pub const CSUM_SEED: Self = Self(0x2000);

    /// Large directories (>2GB or 3-level htree).
    pub const LARGEDIR: Self = Self(0x4000);

    /// File data may be stored inside the inode.
    pub const INLINE_DATA: Self = Self(0x8000);

    /// Filesystem-level encryption of data blocks and file names.
    pub const ENCRYPT: Self = Self(0x10000);

    /// Character encoding support for casefolded directories.
    pub const CASEFOLD: Self = Self(0x20000);

    /// Names of the flags set, for display purposes.
    #[must_use]
    pub fn flag_names(self) -> Vec<&'static str> {
        const NAMES: [(IncompatibleFeatureSet, &str); 16] = [
            (IncompatibleFeatureSet::COMPRESSION, "COMPRESSION"),
            (IncompatibleFeatureSet::FILETYPE, "FILETYPE"),
            (IncompatibleFeatureSet::RECOVER, "RECOVER"),
            (IncompatibleFeatureSet::JOURNAL_DEV, "JOURNAL_DEV"),
            (IncompatibleFeatureSet::META_BG, "META_BG"),
            (IncompatibleFeatureSet::EXTENTS, "EXTENTS"),
            (IncompatibleFeatureSet::SIXTY_FOUR_BIT, "64BIT"),
            (IncompatibleFeatureSet::MMP, "MMP"),
            (IncompatibleFeatureSet::FLEX_BG, "FLEX_BG"),
            (IncompatibleFeatureSet::EA_INODE, "EA_INODE"),
            (IncompatibleFeatureSet::DIRDATA, "DIRDATA"),
            (IncompatibleFeatureSet::CSUM_SEED, "CSUM_SEED"),
            (IncompatibleFeatureSet::LARGEDIR, "LARGEDIR"),
            (IncompatibleFeatureSet::INLINE_DATA, "INLINE_DATA"),
            (IncompatibleFeatureSet::ENCRYPT, "ENCRYPT"),
            (IncompatibleFeatureSet::CASEFOLD, "CASEFOLD"),
        ];

        NAMES
            .iter()
            .filter(|(flag, _)| self.includes(*flag))
            .map(|&(_, name)| name)
            .collect()
    }
}

ext4_flag_field!(
    ReadOnlyCompatibleFeatureSet,
    u32,
    "Read-only compatible feature set flags. If the system does not \
understand one of these flags, it may still mount the filesystem read-only."
);

impl ReadOnlyCompatibleFeatureSet {
    /// Backup copies of the superblock are present only in a subset of block
    /// groups.
    pub const SPARSE_SUPER: Self = Self(0x0001);

    /// Set when a file larger than 2 GiB exists.
    pub const LARGE_FILE: Self = Self(0x0002);

    pub const BTREE_DIR: Self = Self(0x0004);

    /// Files may be larger than 2 TiB; `i_blocks` may count filesystem
    /// blocks instead of 512-byte sectors.
    pub const HUGE_FILE: Self = Self(0x0008);

    /// Group descriptors carry legacy CRC-16 checksums.
    pub const GDT_CSUM: Self = Self(0x0010);

    /// Lifts the usual 65,000 hard link limit per inode.
    pub const DIR_NLINK: Self = Self(0x0020);

    /// Inodes reserve space past the classic 128 bytes for extended
    /// metadata (ns timestamps, creation time).
    pub const EXTRA_ISIZE: Self = Self(0x0040);

    /// Quota inodes are in use.
    pub const QUOTA: Self = Self(0x0100);

    /// Clustered block allocation.
    pub const BIGALLOC: Self = Self(0x0200);

    /// CRC-32C checksums over all filesystem metadata.
    pub const METADATA_CSUM: Self = Self(0x0400);

    /// Read-only filesystem image.
    pub const READONLY: Self = Self(0x1000);

    /// Project quota support.
    pub const PROJECT: Self = Self(0x2000);

    /// Verity protected files.
    pub const VERITY: Self = Self(0x8000);

    pub const ORPHAN_PRESENT: Self = Self(0x10000);

    /// Names of the flags set, for display purposes.
    #[must_use]
    pub fn flag_names(self) -> Vec<&'static str> {
        const NAMES: [(ReadOnlyCompatibleFeatureSet, &str); 14] = [
            (ReadOnlyCompatibleFeatureSet::SPARSE_SUPER, "SPARSE_SUPER"),
            (ReadOnlyCompatibleFeatureSet::LARGE_FILE, "LARGE_FILE"),
            (ReadOnlyCompatibleFeatureSet::BTREE_DIR, "BTREE_DIR"),
            (ReadOnlyCompatibleFeatureSet::HUGE_FILE, "HUGE_FILE"),
            (ReadOnlyCompatibleFeatureSet::GDT_CSUM, "GDT_CSUM"),
            (ReadOnlyCompatibleFeatureSet::DIR_NLINK, "DIR_NLINK"),
            (ReadOnlyCompatibleFeatureSet::EXTRA_ISIZE, "EXTRA_ISIZE"),
            (ReadOnlyCompatibleFeatureSet::QUOTA, "QUOTA"),
            (ReadOnlyCompatibleFeatureSet::BIGALLOC, "BIGALLOC"),
            (ReadOnlyCompatibleFeatureSet::METADATA_CSUM, "METADATA_CSUM"),
            (ReadOnlyCompatibleFeatureSet::READONLY, "READONLY"),
            (ReadOnlyCompatibleFeatureSet::PROJECT, "PROJECT"),
            (ReadOnlyCompatibleFeatureSet::VERITY, "VERITY"),
            (ReadOnlyCompatibleFeatureSet::ORPHAN_PRESENT, "ORPHAN_PRESENT"),
        ];

        NAMES
            .iter()
            .filter(|(flag, _)| self.includes(*flag))
            .map(|&(_, name)| name)
            .collect()
    }
}

/// Magic number `Superblock` field.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct SuperblockMagic(u16);

impl SuperblockMagic {
    pub const MAGIC: Self = Self(EXT4_SIGNATURE);

    #[must_use]
    pub fn is_valid(self) -> bool {
        self == Self::MAGIC
    }
}

/// OS on which the filesystem was created.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct CreatorOs(u32);

impl CreatorOs {
    pub const LINUX: Self = Self(0);

    pub const HURD: Self = Self(1);

    pub const MASIX: Self = Self(2);

    pub const FREEBSD: Self = Self(3);

    pub const LITES: Self = Self(4);
}

/// Metadata checksum algorithm type.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct ChecksumType(u8);

impl ChecksumType {
    /// crc32c (only valid value for that field).
    pub const CRC32C: Self = Self(0x1);
}

/// The ext4 `Superblock` holds useful information about the filesystem's
/// characteristics and attributes (block count, sizes, required features,
/// ...).
///
/// All multi-byte fields are little-endian; the structure is packed with no
/// padding, which lets [`Superblock::decode`] materialise it straight from
/// the raw on-disk bytes.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct Superblock {
    /// Inodes count
    pub inodes_count: u32,

    /// Blocks count, low 32 bits
    pub blocks_count_lo: u32,

    /// Reserved blocks count, low 32 bits
    pub r_blocks_count_lo: u32,

    /// Free blocks count, low 32 bits
    pub free_blocks_count_lo: u32,

    /// Free inodes count
    pub free_inodes_count: u32,

    /// First data block.
    ///
    /// Block number of the block containing the superblock: 1 for 1 KiB
    /// block filesystems, 0 otherwise.
    pub first_data_block: u32,

    /// Block size, defined as `log_2(block_size) - 10`
    pub log_block_size: u32,

    /// Allocation cluster size, defined as `log_2(cluster_size) - 10`
    pub log_cluster_size: u32,

    /// Number of blocks in each group
    pub blocks_per_group: u32,

    /// Number of clusters in each group
    pub clusters_per_group: u32,

    /// Number of inodes in each group
    pub inodes_per_group: u32,

    /// Last mount time
    pub mtime: u32,

    /// Last write time
    pub wtime: u32,

    /// Mount count (since last consistency check)
    pub mnt_count: u16,

    /// Number of mounts allowed before a consistency check is required
    pub max_mnt_count: u16,

    /// `ext4` magic signature: `0xEF53`
    pub magic: SuperblockMagic,

    /// File system state
    pub state: u16,

    /// Behavior on error detection
    pub errors: u16,

    /// Minor revision level
    pub minor_rev_level: u16,

    /// Time of last consistency check
    pub lastcheck: u32,

    /// Max time between successive consistency checks
    pub checkinterval: u32,

    /// Operating System ID from which the filesystem was created
    pub creator_os: CreatorOs,

    /// Major revision level
    pub rev_level: u32,

    /// Default user ID for reserved blocks
    pub def_resuid: u16,

    /// Default group ID for reserved blocks
    pub def_resgid: u16,

    /// First non-reserved inode in file system
    pub first_ino: u32,

    /// Size of each inode structure, in bytes
    pub inode_size: u16,

    /// Block group number of this superblock
    pub block_group_nr: u16,

    /// Compatible feature set
    pub feature_compat: CompatibleFeatureSet,

    /// Incompatible feature set
    pub feature_incompat: IncompatibleFeatureSet,

    /// Read-only compatible feature set
    pub feature_ro_compat: ReadOnlyCompatibleFeatureSet,

    /// 128-bit UUID for volume
    pub uuid: [u8; 16],

    /// Volume name
    pub volume_name: [u8; 16],

    /// Path volume was last mounted to
    pub last_mounted: [u8; 64],

    /// Compression algorithm used
    pub algorithm_usage_bitmap: u32,

    /// Number of blocks to try to preallocate for files
    pub prealloc_blocks: u8,

    /// Number of blocks to preallocate for directories
    pub prealloc_dir_blocks: u8,

    /// Number of reserved GDT entries for future filesystem growth
    pub reserved_gdt_blocks: u16,

    /// UUID of journal superblock
    pub journal_uuid: [u8; 16],

    /// Inode number of journal file
    pub journal_inum: u32,

    /// Device number of journal file
    pub journal_dev: u32,

    /// Start of list of inodes to delete (orphan nodes)
    pub last_orphan: u32,

    /// HTREE hash seed
    pub hash_seed: [u32; 4],

    /// Default hash version to use
    pub def_hash_version: u8,

    pub jnl_backup_type: u8,

    /// Size of group descriptors, in bytes, when the 64-bit feature is set
    pub desc_size: u16,

    /// Default mount options
    pub default_mount_opts: u32,

    /// First metablock block group, if enabled
    pub first_meta_bg: u32,

    /// File system creation time
    pub mkfs_time: u32,

    /// Backup of the journal inode's block map
    pub jnl_blocks: [u32; 17],

    // Valid if the 64-bit feature is enabled.
    /// Blocks count, high 32 bits
    pub blocks_count_hi: u32,

    /// Reserved blocks count, high 32 bits
    pub r_blocks_count_hi: u32,

    /// Free blocks count, high 32 bits
    pub free_blocks_count_hi: u32,

    /// All inodes have at least this many extra bytes
    pub min_extra_isize: u16,

    /// New inodes should reserve this many extra bytes
    pub want_extra_isize: u16,

    /// Miscellaneous flags
    pub flags: u32,

    /// Amount of logical blocks read or written per disk in a RAID array
    pub raid_stride: u16,

    /// Number of seconds to wait in Multi-mount prevention checking
    pub mmp_update_interval: u16,

    /// Block for Multi-mount protection
    pub mmp_block: u64,

    /// Amount of blocks to read or write before returning to the current
    /// disk in a RAID array (N * stride)
    pub raid_stripe_width: u32,

    /// `FLEX_BG` group size, defined as `log_2(groups_per_flex)`
    pub log_groups_per_flex: u8,

    /// Metadata checksum algorithm used
    pub checksum_type: ChecksumType,

    /// Padding to next 32 bits
    pub reserved_pad: u16,

    /// Amount of KiBs written over the filesystem's lifetime
    pub kbytes_written: u64,

    /// Inode number of the active snapshot
    pub snapshot_inum: u32,

    /// Sequential ID of active snapshot
    pub snapshot_id: u32,

    /// Reserved blocks for active snapshot's future use
    pub snapshot_r_blocks_count: u64,

    /// Inode number of the head of the on-disk snapshot list
    pub snapshot_list: u32,

    /// Number of filesystem errors
    pub error_count: u32,

    /// First time an error occurred
    pub first_error_time: u32,

    /// Inode number in the first error
    pub first_error_ino: u32,

    /// Block number in the first error
    pub first_error_block: u64,

    /// Function where the first error occurred
    pub first_error_func: [u8; 32],

    /// Line number where the first error occurred
    pub first_error_line: u32,

    /// Last time an error occurred
    pub last_error_time: u32,

    /// Inode number of the last error
    pub last_error_ino: u32,

    /// Line number where the last error occurred
    pub last_error_line: u32,

    /// Block number in the last error
    pub last_error_block: u64,

    /// Function where the last error occurred
    pub last_error_func: [u8; 32],

    /// Mount options (C string)
    pub mount_opts: [u8; 64],

    /// Inode number for user quota file
    pub usr_quota_inum: u32,

    /// Inode number for group quota file
    pub grp_quota_inum: u32,

    /// Overhead blocks/clusters in file system
    pub overhead_clusters: u32,

    /// Block groups with backup superblocks, if `SPARSE_SUPER2` is set
    pub backup_bgs: [u32; 2],

    /// Encryption algorithms in use
    pub encrypt_algos: [u8; 4],

    /// Salt used for the `string2key` algorithm
    pub encrypt_pw_salt: [u8; 16],

    /// Location of the lost+found inode
    pub lpf_ino: u32,

    /// Inode for tracking project quota
    pub prj_quota_inum: u32,

    /// `crc32c(uuid)` if `csum_seed` is set
    pub checksum_seed: u32,

    /// High 8 bits of the last written time field
    pub wtime_hi: u8,

    /// High 8 bits of the last mount time field
    pub mtime_hi: u8,

    /// High 8 bits of the filesystem creation time field
    pub mkfs_time_hi: u8,

    /// High 8 bits of the last consistency check time field
    pub lastcheck_hi: u8,

    /// High 8 bits of the first error time field
    pub first_error_time_hi: u8,

    /// High 8 bits of the last error time field
    pub last_error_time_hi: u8,

    /// Error code of the first error
    pub first_error_errcode: u8,

    /// Error code of the last error
    pub last_error_errcode: u8,

    /// Filename charset encoding
    pub encoding: u16,

    /// Filename charset encoding flags
    pub encoding_flags: u16,

    /// Inode for tracking orphan inodes
    pub orphan_file_inum: u32,

    pub reserved: [u32; 94],

    /// Checksum of the superblock: `crc32c(superblock[0..0x3FC])`
    pub checksum: u32,
}

const _: () = assert!(core::mem::size_of::<Superblock>() == SUPERBLOCK_SIZE);

impl Superblock {
    /// Decodes a `Superblock` from its raw on-disk bytes.
    ///
    /// The input is truncated or zero-extended to the 1024-byte structure
    /// width. Fails with [`Ext4Error::Corruption`] if the magic signature or
    /// the block-size exponent is invalid; checksum verification is a
    /// separate step ([`Superblock::verify_checksum`]) driven by the
    /// session.
    pub fn decode(bytes: &[u8]) -> Ext4Result<Self> {
        let mut filled = [0u8; SUPERBLOCK_SIZE];
        let len = usize::min(bytes.len(), SUPERBLOCK_SIZE);
        filled[..len].copy_from_slice(&bytes[..len]);

        let sb: Self = *from_bytes(&filled);

        let magic = sb.magic;
        if !magic.is_valid() {
            return Err(Ext4Error::Corruption(format!(
                "invalid superblock magic {:#06x} (expected {:#06x})",
                magic.0, EXT4_SIGNATURE
            )));
        }

        if sb.log_block_size > 6 {
            let log = sb.log_block_size;
            return Err(Ext4Error::Corruption(format!(
                "invalid block size exponent {log} (block size above 64 KiB)"
            )));
        }

        let desc_size = sb.desc_size;
        if sb.has_incompat(IncompatibleFeatureSet::SIXTY_FOUR_BIT)
            && (desc_size < 32
                || !desc_size.is_power_of_two()
                || u64::from(desc_size) > sb.blk_size())
        {
            return Err(Ext4Error::Corruption(format!(
                "invalid group descriptor size {desc_size}"
            )));
        }

        Ok(sb)
    }

    /// Compares the checksum of the `Superblock` to its on-disk value.
    ///
    /// The checksum covers the raw superblock bytes before the `checksum`
    /// field itself: `crc32c(superblock[0..0x3FC])`.
    pub fn verify_checksum(&self) -> Ext4Result<()> {
        let computed = crc32c(
            &bytes_of(self)[..SUPERBLOCK_CHECKSUM_OFFSET],
            CRC32C_INIT,
        );
        let stored = self.checksum;

        if computed != stored {
            log::error!(
                "invalid superblock checksum (got {computed:#010x} expected {stored:#010x})"
            );
            return Err(Ext4Error::Corruption(format!(
                "superblock checksum mismatch (got {computed:#010x} expected {stored:#010x})"
            )));
        }

        Ok(())
    }

    /// Returns the size of a block, in bytes.
    #[must_use]
    pub fn blk_size(&self) -> u64 {
        1024 << self.log_block_size
    }

    /// Returns the total count of blocks.
    #[must_use]
    pub fn blk_count(&self) -> u64 {
        if self.has_incompat(IncompatibleFeatureSet::SIXTY_FOUR_BIT) {
            u64::from(self.blocks_count_lo) | (u64::from(self.blocks_count_hi) << 32)
        } else {
            u64::from(self.blocks_count_lo)
        }
    }

    /// Returns the number of block groups for this filesystem.
    #[must_use]
    pub fn bg_count(&self) -> u32 {
        let data_blocks = self.blk_count() - u64::from(self.first_data_block);
        let per_group = u64::from(self.blocks_per_group);

        data_blocks.div_ceil(per_group) as u32
    }

    /// Returns the size of a block group descriptor, in bytes: the
    /// superblock's `desc_size` under the 64-bit feature, the classic 32
    /// bytes otherwise.
    #[must_use]
    pub fn bgd_size(&self) -> u64 {
        if self.has_incompat(IncompatibleFeatureSet::SIXTY_FOUR_BIT) {
            u64::from(self.desc_size)
        } else {
            32
        }
    }

    /// Returns the number of block groups bundled into a flex group.
    #[must_use]
    pub fn groups_per_flex(&self) -> u64 {
        1 << self.log_groups_per_flex
    }

    /// The filesystem UUID.
    #[must_use]
    pub fn fs_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.uuid)
    }

    /// The seed for every per-object metadata checksum.
    ///
    /// Comes straight from the superblock when the `csum_seed` feature is
    /// set, and is derived from the UUID otherwise.
    #[must_use]
    pub fn csum_seed(&self) -> u32 {
        if self.has_incompat(IncompatibleFeatureSet::CSUM_SEED) {
            self.checksum_seed
        } else {
            let uuid = self.uuid;
            crc32c(&uuid, CRC32C_INIT)
        }
    }

    /// Checks whether metadata checksum verification applies to this
    /// filesystem.
    #[must_use]
    pub fn has_metadata_csum(&self) -> bool {
        self.has_ro_compat(ReadOnlyCompatibleFeatureSet::METADATA_CSUM)
    }

    /// Checks if one or more incompatible features are set.
    #[must_use]
    pub fn has_incompat(&self, features: IncompatibleFeatureSet) -> bool {
        let set = self.feature_incompat;
        set.includes(features)
    }

    /// Checks if one or more read-only compatible features are set.
    #[must_use]
    pub fn has_ro_compat(&self, features: ReadOnlyCompatibleFeatureSet) -> bool {
        let set = self.feature_ro_compat;
        set.includes(features)
    }

    /// Checks if one or more compatible features are set.
    #[must_use]
    pub fn has_compat(&self, features: CompatibleFeatureSet) -> bool {
        let set = self.feature_compat;
        set.includes(features)
    }

    /// The volume label, with trailing NULs stripped.
    #[must_use]
    pub fn volume_name(&self) -> String {
        let name = self.volume_name;
        name.iter()
            .copied()
            .take_while(|&b| b != 0)
            .map(char::from)
            .collect()
    }
}
