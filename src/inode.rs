//! ext4 inode related structures.
//!
//! Inodes (index nodes) are the base structure holding metadata about
//! filesystem objects (files, directories, ...): mode, ownership,
//! timestamps, and the root of the object's data map.

use std::fmt::{self, Display, Formatter};

use bytemuck::{from_bytes, Pod, Zeroable};

use crate::csum::crc32c;
use crate::error::{Ext4Error, Ext4Result};
use crate::sb::{CreatorOs, Superblock};
use crate::time::Ext4Timestamp;

/// Width of the classic `ext2` inode, in bytes. `i_extra_isize` counts the
/// bytes in use past this point.
pub const INODE_BASE_SIZE: usize = 128;

/// Width of the decoded [`Inode`] structure (classic block plus every known
/// extension field), in bytes.
pub const INODE_STRUCT_SIZE: usize = 160;

/// Byte offset of `l_i_checksum_lo` in the inode record.
const INODE_CHECKSUM_LO_OFFSET: usize = 0x7C;

/// Byte offset of `i_checksum_hi` in the inode record.
const INODE_CHECKSUM_HI_OFFSET: usize = 0x82;

/// A number identifying an inode. Valid inode numbers start at 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct InodeNumber(pub u32);

impl InodeNumber {
    /// Inode 0 marks an unused directory entry.
    pub const UNUSED_DIR_ENTRY: Self = Self(0);

    /// Inode 1 lists defective blocks.
    pub const DEFECTIVE_BLOCKS: Self = Self(1);

    /// Inode 2 is the root directory of the filesystem.
    pub const ROOT_DIR: Self = Self(2);

    /// Inode 3 is the user quota file.
    pub const USER_QUOTA: Self = Self(3);

    /// Inode 4 is the group quota file.
    pub const GROUP_QUOTA: Self = Self(4);

    /// Inode 5 is unused, but may have been intended for stage 2 boot
    /// loaders.
    pub const BOOT_LOADER: Self = Self(5);

    /// Inode 6 is unused, but may have been intended for the never
    /// implemented undeletion.
    pub const UNDELETE: Self = Self(6);

    /// Inode 7 is the reserved group descriptors inode.
    pub const RESIZE: Self = Self(7);

    /// Inode 8 is the ext4 journal.
    pub const JOURNAL: Self = Self(8);

    /// Inode 9 is the exclude inode, for snapshots.
    pub const EXCLUDE: Self = Self(9);

    /// Inode 10 is used for metadata replication in some non-upstream
    /// patches.
    pub const REPLICA: Self = Self(10);

    /// First inode available for user files.
    pub const FIRST_NON_RESERVED: Self = Self(11);
}

impl Display for InodeNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// File mode / type representation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct InodeFileMode(pub u16);

impl InodeFileMode {
    const EMPTY_MODE: Self = Self(0);

    /// Mask of the mutually-exclusive file type nibble.
    const TYPE_MASK: u16 = 0xF000;

    /// Others may execute.
    pub const S_IXOTH: Self = Self(0x0001);

    /// Others may write.
    pub const S_IWOTH: Self = Self(0x0002);

    /// Others may read.
    pub const S_IROTH: Self = Self(0x0004);

    /// Group may execute.
    pub const S_IXGRP: Self = Self(0x0008);

    /// Group may write.
    pub const S_IWGRP: Self = Self(0x0010);

    /// Group may read.
    pub const S_IRGRP: Self = Self(0x0020);

    /// User may execute.
    pub const S_IXUSR: Self = Self(0x0040);

    /// User may write.
    pub const S_IWUSR: Self = Self(0x0080);

    /// User may read.
    pub const S_IRUSR: Self = Self(0x0100);

    /// Sticky bit.
    pub const S_ISVTX: Self = Self(0x0200);

    /// Set GID.
    pub const S_ISGID: Self = Self(0x0400);

    /// Set UID.
    pub const S_ISUID: Self = Self(0x0800);

    /// FIFO.
    pub const S_IFIFO: Self = Self(0x1000);

    /// Character device.
    pub const S_IFCHR: Self = Self(0x2000);

    /// Directory.
    pub const S_IFDIR: Self = Self(0x4000);

    /// Block device.
    pub const S_IFBLK: Self = Self(0x6000);

    /// Regular file.
    pub const S_IFREG: Self = Self(0x8000);

    /// Symbolic link.
    pub const S_IFLNK: Self = Self(0xA000);

    /// Socket.
    pub const S_IFSOCK: Self = Self(0xC000);

    /// Checks if this mode contains a subset of permission bits.
    #[must_use]
    pub fn contains(self, mode: InodeFileMode) -> bool {
        Self(self.0 & mode.0) != Self::EMPTY_MODE
    }

    /// The file type part of the mode.
    #[must_use]
    pub fn file_type_bits(self) -> u16 {
        self.0 & Self::TYPE_MASK
    }
}

macro_rules! symb_perm {
    ($self: ident, $str: tt, $symbol: literal, $flag: expr) => {
        if $self.contains($flag) {
            $str.push($symbol);
        } else {
            $str.push('-');
        }
    };
}

// Execute positions swap to s/S (setuid, setgid) and t/T (sticky).
macro_rules! symb_exec_perm {
    ($self: ident, $str: tt, $exec: expr, $special: expr, $schar: literal, $uschar: literal) => {
        match ($self.contains($exec), $self.contains($special)) {
            (true, false) => $str.push('x'),
            (false, false) => $str.push('-'),
            (true, true) => $str.push($schar),
            (false, true) => $str.push($uschar),
        }
    };
}

impl Display for InodeFileMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut symbolic_str = String::new();

        symb_perm!(self, symbolic_str, 'r', InodeFileMode::S_IRUSR);
        symb_perm!(self, symbolic_str, 'w', InodeFileMode::S_IWUSR);
        symb_exec_perm!(
            self,
            symbolic_str,
            InodeFileMode::S_IXUSR,
            InodeFileMode::S_ISUID,
            's',
            'S'
        );
        symb_perm!(self, symbolic_str, 'r', InodeFileMode::S_IRGRP);
        symb_perm!(self, symbolic_str, 'w', InodeFileMode::S_IWGRP);
        symb_exec_perm!(
            self,
            symbolic_str,
            InodeFileMode::S_IXGRP,
            InodeFileMode::S_ISGID,
            's',
            'S'
        );
        symb_perm!(self, symbolic_str, 'r', InodeFileMode::S_IROTH);
        symb_perm!(self, symbolic_str, 'w', InodeFileMode::S_IWOTH);
        symb_exec_perm!(
            self,
            symbolic_str,
            InodeFileMode::S_IXOTH,
            InodeFileMode::S_ISVTX,
            't',
            'T'
        );

        f.write_str(&symbolic_str)
    }
}

/// Type associated to a given [`Inode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InodeType {
    Regular,
    Directory,
    Fifo,
    CharacterDevice,
    BlockDevice,
    SymbolicLink,
    Socket,
}

impl Display for InodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let type_str = match self {
            InodeType::Regular => "File",
            InodeType::Directory => "Directory",
            InodeType::Fifo => "FIFO",
            InodeType::CharacterDevice => "Character device",
            InodeType::BlockDevice => "Block device",
            InodeType::SymbolicLink => "Symbolic link",
            InodeType::Socket => "Socket",
        };

        f.write_str(type_str)
    }
}

impl TryFrom<InodeFileMode> for InodeType {
    type Error = Ext4Error;

    fn try_from(value: InodeFileMode) -> Result<Self, Self::Error> {
        match InodeFileMode(value.file_type_bits()) {
            InodeFileMode::S_IFIFO => Ok(Self::Fifo),
            InodeFileMode::S_IFCHR => Ok(Self::CharacterDevice),
            InodeFileMode::S_IFDIR => Ok(Self::Directory),
            InodeFileMode::S_IFBLK => Ok(Self::BlockDevice),
            InodeFileMode::S_IFREG => Ok(Self::Regular),
            InodeFileMode::S_IFLNK => Ok(Self::SymbolicLink),
            InodeFileMode::S_IFSOCK => Ok(Self::Socket),
            other => Err(Ext4Error::Decoding(format!(
                "unknown file type {:#06x} in inode mode",
                other.0
            ))),
        }
    }
}

/// Inode flags set in the `i_flags` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct InodeFlags(pub u32);

impl InodeFlags {
    /// This file requires secure deletion (not implemented).
    pub const SECRM: Self = Self(0x1);

    /// This file should be preserved (not implemented).
    pub const UNRM: Self = Self(0x2);

    /// File is compressed.
    pub const COMPR: Self = Self(0x4);

    /// All writes to the file must be synchronous.
    pub const SYNC: Self = Self(0x8);

    /// File is immutable.
    pub const IMMUTABLE: Self = Self(0x10);

    /// File can only be appended.
    pub const APPEND: Self = Self(0x20);

    /// The `dump` utility should not dump this file.
    pub const NODUMP: Self = Self(0x40);

    /// Do not update access time.
    pub const NOATIME: Self = Self(0x80);

    /// Encrypted inode.
    pub const ENCRYPT: Self = Self(0x800);

    /// Directory has hashed indexes.
    pub const INDEX: Self = Self(0x1000);

    /// AFS magic directory.
    pub const IMAGIC: Self = Self(0x2000);

    /// File data must always be written through the journal.
    pub const JOURNAL_DATA: Self = Self(0x4000);

    /// File tail should not be merged.
    pub const NOTAIL: Self = Self(0x8000);

    /// All directory entry data should be written synchronously.
    pub const DIRSYNC: Self = Self(0x10000);

    /// Top of directory hierarchy.
    pub const TOPDIR: Self = Self(0x20000);

    /// Huge file: `i_blocks` counts filesystem blocks, not 512-byte
    /// sectors.
    pub const HUGE_FILE: Self = Self(0x40000);

    /// Inode uses extents.
    pub const EXTENTS: Self = Self(0x80000);

    /// Verity protected file.
    pub const VERITY: Self = Self(0x10_0000);

    /// Inode stores a large extended attribute value in its data blocks.
    pub const EA_INODE: Self = Self(0x20_0000);

    /// Inode has inline data.
    pub const INLINE_DATA: Self = Self(0x400_0000);

    /// Create children with the same project ID.
    pub const PROJINHERIT: Self = Self(0x800_0000);

    /// Reserved for the `ext4` library.
    pub const RESERVED: Self = Self(0x8000_0000);

    /// Names of the flags set, for display purposes.
    #[must_use]
    pub fn flag_names(self) -> Vec<&'static str> {
        const NAMES: [(InodeFlags, &str); 21] = [
            (InodeFlags::SECRM, "SECRM"),
            (InodeFlags::UNRM, "UNRM"),
            (InodeFlags::COMPR, "COMPR"),
            (InodeFlags::SYNC, "SYNC"),
            (InodeFlags::IMMUTABLE, "IMMUTABLE"),
            (InodeFlags::APPEND, "APPEND"),
            (InodeFlags::NODUMP, "NODUMP"),
            (InodeFlags::NOATIME, "NOATIME"),
            (InodeFlags::ENCRYPT, "ENCRYPT"),
            (InodeFlags::INDEX, "INDEX"),
            (InodeFlags::IMAGIC, "IMAGIC"),
            (InodeFlags::JOURNAL_DATA, "JOURNAL_DATA"),
            (InodeFlags::NOTAIL, "NOTAIL"),
            (InodeFlags::DIRSYNC, "DIRSYNC"),
            (InodeFlags::TOPDIR, "TOPDIR"),
            (InodeFlags::HUGE_FILE, "HUGE_FILE"),
            (InodeFlags::EXTENTS, "EXTENTS"),
            (InodeFlags::VERITY, "VERITY"),
            (InodeFlags::EA_INODE, "EA_INODE"),
            (InodeFlags::INLINE_DATA, "INLINE_DATA"),
            (InodeFlags::PROJINHERIT, "PROJINHERIT"),
        ];

        NAMES
            .iter()
            .filter(|(flag, _)| self.0 & flag.0 != 0)
            .map(|&(_, name)| name)
            .collect()
    }
}

/// The `Inode` (index node) stores all metadata related to a file or a
/// directory (permissions, data blocks, timestamps, ...).
///
/// The structure covers the 128-byte classic block plus every known
/// extension field; `i_extra_isize` tells how much of the extension the
/// on-disk record actually uses. The 60-byte `i_block` field is polymorphic
/// (legacy block map, extent tree root, or fast symlink target) and is kept
/// opaque here; [`crate::file`] interprets it lazily from `i_flags`.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct Inode {
    /// File mode
    pub i_mode: InodeFileMode,

    /// Owner UID, low 16 bits
    pub i_uid: u16,

    /// Size in bytes, low 32 bits
    pub i_size_lo: u32,

    /// Last access time, in seconds since the epoch
    pub i_atime: u32,

    /// Last inode change time, in seconds since the epoch
    pub i_ctime: u32,

    /// Last data modification time, in seconds since the epoch
    pub i_mtime: u32,

    /// Deletion time, in seconds since the epoch
    pub i_dtime: u32,

    /// GID, low 16 bits
    pub i_gid: u16,

    /// Hard link count
    pub i_links_count: u16,

    /// Block count, low 32 bits
    pub i_blocks_lo: u32,

    /// Inode flags
    pub i_flags: InodeFlags,

    /// Inode version
    pub i_version: u32,

    /// Block map, extent tree root, or fast symlink target
    pub i_block: [u8; 60],

    /// File version
    pub i_generation: u32,

    /// Extended attribute block, low 32 bits
    pub i_file_acl_lo: u32,

    /// Size in bytes, high 32 bits
    pub i_size_high: u32,

    /// Fragment address (obsolete)
    pub i_obso_faddr: u32,

    /// Block count, high 16 bits
    pub i_blocks_high: u16,

    /// Extended attribute block, high 16 bits
    pub i_file_acl_high: u16,

    /// Owner UID, high 16 bits
    pub i_uid_high: u16,

    /// GID, high 16 bits
    pub i_gid_high: u16,

    /// Inode checksum, low 16 bits
    pub i_checksum_lo: u16,

    pub reserved: u16,

    /// Size of this inode beyond the classic 128 bytes
    pub i_extra_isize: u16,

    /// Inode checksum, high 16 bits
    pub i_checksum_hi: u16,

    /// Extra change time bits
    pub i_ctime_extra: u32,

    /// Extra modification time bits
    pub i_mtime_extra: u32,

    /// Extra access time bits
    pub i_atime_extra: u32,

    /// File creation time, in seconds since the epoch
    pub i_crtime: u32,

    /// Extra file creation time bits
    pub i_crtime_extra: u32,

    /// Version number, high 32 bits
    pub i_version_hi: u32,

    /// Project ID
    pub i_projid: u32,
}

const _: () = assert!(core::mem::size_of::<Inode>() == INODE_STRUCT_SIZE);

impl fmt::Debug for Inode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mode = self.i_mode;
        let flags = self.i_flags;
        let links = self.i_links_count;

        f.debug_struct("Inode")
            .field("mode", &format_args!("{:#06x}", mode.0))
            .field("size", &self.size())
            .field("flags", &format_args!("{:#x}", flags.0))
            .field("links", &links)
            .finish_non_exhaustive()
    }
}

impl Inode {
    /// Decodes an `Inode` from its raw on-disk record.
    ///
    /// The input is truncated or zero-extended to the structure width, so a
    /// classic 128-byte record reads with every extension field zero.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        let mut filled = [0u8; INODE_STRUCT_SIZE];
        let len = usize::min(bytes.len(), INODE_STRUCT_SIZE);
        filled[..len].copy_from_slice(&bytes[..len]);

        *from_bytes(&filled)
    }

    /// Returns the size of the object described by this inode, in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.i_size_lo) | (u64::from(self.i_size_high) << 32)
    }

    /// Returns the block count of this inode.
    ///
    /// The unit is 512-byte sectors, unless the filesystem carries the
    /// `huge_file` feature and the inode the `HUGE_FILE` flag, in which
    /// case it counts filesystem blocks.
    #[must_use]
    pub fn blk_count(&self) -> u64 {
        u64::from(self.i_blocks_lo) | (u64::from(self.i_blocks_high) << 32)
    }

    /// Returns the type of this inode (file, directory, ...).
    pub fn inode_type(&self) -> Ext4Result<InodeType> {
        InodeType::try_from(self.i_mode)
    }

    /// Returns the Owner UID of this inode.
    #[must_use]
    pub fn uid(&self) -> u32 {
        u32::from(self.i_uid) | (u32::from(self.i_uid_high) << 16)
    }

    /// Returns the Group ID to which this inode belongs.
    #[must_use]
    pub fn gid(&self) -> u32 {
        u32::from(self.i_gid) | (u32::from(self.i_gid_high) << 16)
    }

    /// Checks if one or more inode flags are set.
    #[must_use]
    pub fn has_flag(&self, flag: InodeFlags) -> bool {
        let flags = self.i_flags;
        flags.0 & flag.0 != 0
    }

    /// Checks if this inode maps its data blocks through an extent tree
    /// rather than the legacy block map.
    #[must_use]
    pub fn uses_extent_tree(&self) -> bool {
        self.has_flag(InodeFlags::EXTENTS)
    }

    /// Last access time.
    #[must_use]
    pub fn access_time(&self) -> Ext4Timestamp {
        Ext4Timestamp::new(self.i_atime, self.extra_time(0x8C, self.i_atime_extra))
    }

    /// Last inode change time.
    #[must_use]
    pub fn change_time(&self) -> Ext4Timestamp {
        Ext4Timestamp::new(self.i_ctime, self.extra_time(0x84, self.i_ctime_extra))
    }

    /// Last data modification time.
    #[must_use]
    pub fn modification_time(&self) -> Ext4Timestamp {
        Ext4Timestamp::new(self.i_mtime, self.extra_time(0x88, self.i_mtime_extra))
    }

    /// File creation time, when the inode is large enough to record one.
    #[must_use]
    pub fn creation_time(&self) -> Ext4Timestamp {
        Ext4Timestamp::new(self.i_crtime, self.extra_time(0x94, self.i_crtime_extra))
    }

    /// Deletion time, in seconds since the epoch.
    #[must_use]
    pub fn deletion_time(&self) -> Ext4Timestamp {
        Ext4Timestamp::new(self.i_dtime, None)
    }

    /// An `_extra` timestamp field is present when the in-use extension
    /// region extends past the field's offset.
    fn extra_time(&self, field_offset: usize, extra: u32) -> Option<u32> {
        (usize::from(self.i_extra_isize) > field_offset - INODE_BASE_SIZE).then_some(extra)
    }

    /// Compares the checksum of the inode to its on-disk value.
    ///
    /// `raw` must be the full on-disk inode record (`s_inode_size` bytes):
    /// the CRC covers the record past the in-use extension, and the
    /// checksum bytes themselves are replaced by zeroes when their half of
    /// the field exists. The CRC is seeded with the filesystem checksum
    /// seed, then the inode number and generation are folded in before the
    /// record itself.
    pub fn verify_checksum(
        &self,
        raw: &[u8],
        sb: &Superblock,
        inode_no: InodeNumber,
        seed: u32,
    ) -> Ext4Result<()> {
        let creator_os = sb.creator_os;
        let has_lo = creator_os == CreatorOs::LINUX;
        let has_hi = self.i_extra_isize > 2;

        let mut crc = crc32c(&inode_no.0.to_le_bytes(), seed);
        let generation = self.i_generation;
        crc = crc32c(&generation.to_le_bytes(), crc);

        let lo_off = usize::min(INODE_CHECKSUM_LO_OFFSET, raw.len());
        let lo_end = usize::min(INODE_CHECKSUM_LO_OFFSET + 2, raw.len());
        let hi_off = usize::min(INODE_CHECKSUM_HI_OFFSET, raw.len());
        let hi_end = usize::min(INODE_CHECKSUM_HI_OFFSET + 2, raw.len());

        crc = crc32c(&raw[..lo_off], crc);
        if has_lo {
            crc = crc32c(&[0u8; 2][..lo_end - lo_off], crc);
        } else {
            crc = crc32c(&raw[lo_off..lo_end], crc);
        }
        crc = crc32c(&raw[lo_end..hi_off], crc);
        if has_hi {
            crc = crc32c(&[0u8; 2][..hi_end - hi_off], crc);
        } else {
            crc = crc32c(&raw[hi_off..hi_end], crc);
        }
        crc = crc32c(&raw[hi_end..], crc);

        let mut expected = 0u32;
        let mut mask = 0u32;
        if has_lo {
            expected |= u32::from(self.i_checksum_lo);
            mask |= 0xFFFF;
        }
        if has_hi {
            expected |= u32::from(self.i_checksum_hi) << 16;
            mask |= 0xFFFF_0000;
        }

        let computed = crc & mask;
        if computed != expected {
            log::error!(
                "invalid inode checksum (inode {inode_no}, got {computed:#010x} expected \
                 {expected:#010x})"
            );
            return Err(Ext4Error::Corruption(format!(
                "inode {inode_no} checksum mismatch (got {computed:#010x} expected \
                 {expected:#010x})"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::bytes_of;

    #[test]
    fn mode_rendering() {
        assert_eq!(InodeFileMode(0o755).to_string(), "rwxr-xr-x");
        assert_eq!(InodeFileMode(0o644).to_string(), "rw-r--r--");
        assert_eq!(InodeFileMode(0o4755).to_string(), "rwsr-xr-x");
        assert_eq!(InodeFileMode(0o4644).to_string(), "rwSr--r--");
        assert_eq!(InodeFileMode(0o2711).to_string(), "rwx--s--x");
        assert_eq!(InodeFileMode(0o1777).to_string(), "rwxrwxrwt");
        assert_eq!(InodeFileMode(0o1776).to_string(), "rwxrwxrwT");
    }

    #[test]
    fn type_dispatch_from_mode() {
        assert_eq!(
            InodeType::try_from(InodeFileMode(0x41ED)).unwrap(),
            InodeType::Directory
        );
        assert_eq!(
            InodeType::try_from(InodeFileMode(0x81A4)).unwrap(),
            InodeType::Regular
        );
        assert_eq!(
            InodeType::try_from(InodeFileMode(0xA1FF)).unwrap(),
            InodeType::SymbolicLink
        );
        assert!(matches!(
            InodeType::try_from(InodeFileMode(0x0000)),
            Err(Ext4Error::Decoding(_))
        ));
    }

    #[test]
    fn size_composition() {
        let mut raw = [0u8; INODE_STRUCT_SIZE];
        raw[0x04..0x08].copy_from_slice(&0x1000u32.to_le_bytes());
        raw[0x6C..0x70].copy_from_slice(&0x2u32.to_le_bytes());

        let inode = Inode::decode(&raw);
        assert_eq!(inode.size(), 0x2_0000_1000);
    }

    #[test]
    fn extra_timestamps_gated_on_extra_isize() {
        let mut raw = [0u8; INODE_STRUCT_SIZE];
        raw[0x08..0x0C].copy_from_slice(&100u32.to_le_bytes()); // i_atime
        raw[0x8C..0x90].copy_from_slice(&((7u32 << 2) | 0x1).to_le_bytes());

        // No extension in use: the extra field is ignored.
        let inode = Inode::decode(&raw);
        assert_eq!(inode.access_time().seconds(), 100);
        assert_eq!(inode.access_time().nanoseconds(), 0);

        // i_extra_isize covering i_atime_extra.
        raw[0x80..0x82].copy_from_slice(&32u16.to_le_bytes());
        let inode = Inode::decode(&raw);
        assert_eq!(inode.access_time().seconds(), (1 << 32) + 100);
        assert_eq!(inode.access_time().nanoseconds(), 7);
    }

    #[test]
    fn truncated_record_is_zero_extended() {
        let mut raw = [0u8; INODE_BASE_SIZE];
        raw[0x00..0x02].copy_from_slice(&0x81A4u16.to_le_bytes());

        let inode = Inode::decode(&raw);
        assert_eq!(inode.inode_type().unwrap(), InodeType::Regular);
        assert_eq!({ inode.i_extra_isize }, 0);
        assert_eq!(&bytes_of(&inode)[..INODE_BASE_SIZE], &raw[..]);
    }
}
