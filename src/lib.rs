//! Read-only reader for the on-disk layout of the `ext4` filesystem.
//!
//! [`Ext4Fs`] opens a block device or disk image, decodes and caches the
//! superblock, and resolves inodes, directories and file contents straight
//! from the raw bytes. Decoded structures are immutable value objects; the
//! session owns the device handle and lends views to callers.
//!
//! ```no_run
//! use ext4_reader::{Ext4Fs, File};
//!
//! # fn main() -> ext4_reader::Ext4Result<()> {
//! let fs = Ext4Fs::open("/dev/sda1")?;
//!
//! if let File::Regular(file) = fs.file("/etc/hostname")? {
//!     let content = file.read_all(&fs)?;
//!     print!("{}", String::from_utf8_lossy(&content));
//! }
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;

pub mod block_grp;
pub mod csum;
pub mod dev;
pub mod dir;
pub mod error;
pub mod extent;
pub mod file;
pub mod inode;
pub mod sb;
pub mod time;

pub use crate::error::{Ext4Error, Ext4Result};
pub use crate::file::{Directory, File, FileContent, RegularFile, SymbolicLink};
pub use crate::inode::{Inode, InodeNumber, InodeType};
pub use crate::sb::{Superblock, EXT4_SIGNATURE};

use crate::block_grp::{BlockGroupNumber, GroupDescriptor};
use crate::dev::BlockDevice;
use crate::inode::INODE_BASE_SIZE;
use crate::sb::{
    IncompatibleFeatureSet, ReadOnlyCompatibleFeatureSet, SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE,
};

/// The block group descriptor cache keeps this many most-recently-used
/// entries per session.
const BGD_CACHE_CAPACITY: usize = 32;

/// An open `ext4` filesystem session.
///
/// The session is synchronous and single-threaded: it owns the device
/// handle and serialises reads. Two sessions on the same device are
/// independent. The handle is released when the session is dropped.
pub struct Ext4Fs {
    device: BlockDevice,
    superblock: Superblock,
    csum_seed: u32,
    verify_checksums: bool,
    bgd_cache: RefCell<VecDeque<(BlockGroupNumber, GroupDescriptor)>>,
}

impl Ext4Fs {
    /// Opens the `ext4` filesystem on the device or image at `path`.
    ///
    /// Reads and decodes the superblock at byte offset `0x400`, verifying
    /// its magic and, when `metadata_csum` requires one, its checksum.
    /// Filesystems carrying incompatible features the reader cannot honour
    /// (inline data, large directories, encryption) are rejected with
    /// [`Ext4Error::Unsupported`].
    pub fn open<P: AsRef<Path>>(path: P) -> Ext4Result<Self> {
        let device = BlockDevice::open(path)?;

        let raw_sb = device.read(SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE)?;
        let superblock = Superblock::decode(&raw_sb)?;

        if superblock.has_metadata_csum() {
            superblock.verify_checksum()?;
        }

        if superblock.has_incompat(IncompatibleFeatureSet::INLINE_DATA) {
            return Err(Ext4Error::Unsupported("inline data"));
        }
        if superblock.has_incompat(IncompatibleFeatureSet::LARGEDIR) {
            return Err(Ext4Error::Unsupported("large directories"));
        }
        if superblock.has_incompat(IncompatibleFeatureSet::ENCRYPT) {
            return Err(Ext4Error::Unsupported("filesystem-level encryption"));
        }

        let csum_seed = superblock.csum_seed();

        log::info!(
            "opened ext4 filesystem: label = {:?}, uuid = {}, {} blocks of {} bytes, {} inodes",
            superblock.volume_name(),
            superblock.fs_uuid(),
            superblock.blk_count(),
            superblock.blk_size(),
            { superblock.inodes_count },
        );

        Ok(Self {
            device,
            superblock,
            csum_seed,
            verify_checksums: true,
            bgd_cache: RefCell::new(VecDeque::with_capacity(BGD_CACHE_CAPACITY)),
        })
    }

    /// The decoded superblock of this filesystem.
    #[must_use]
    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// Controls whether metadata checksum mismatches raise
    /// [`Ext4Error::Corruption`] (the default) or are ignored.
    pub fn set_verify_checksums(&mut self, verify: bool) {
        self.verify_checksums = verify;
    }

    /// Whether metadata checksums are being verified.
    #[must_use]
    pub fn verify_checksums(&self) -> bool {
        self.verify_checksums
    }

    /// The seed for per-object metadata checksums, computed once at open
    /// time.
    #[must_use]
    pub fn csum_seed(&self) -> u32 {
        self.csum_seed
    }

    /// Interpretation chosen for `i_blocks` on `huge_file` filesystems:
    /// when this returns `true`, an inode carrying the `HUGE_FILE` flag
    /// counts filesystem blocks rather than 512-byte sectors.
    #[must_use]
    pub fn huge_file_block_units(&self) -> bool {
        self.superblock
            .has_ro_compat(ReadOnlyCompatibleFeatureSet::HUGE_FILE)
    }

    /// Reads the physical block `blk_no`.
    pub fn read_block(&self, blk_no: u64) -> Ext4Result<Vec<u8>> {
        self.read_blocks(blk_no, 1)
    }

    /// Reads `count` consecutive physical blocks starting at `blk_no`.
    pub fn read_blocks(&self, blk_no: u64, count: u64) -> Ext4Result<Vec<u8>> {
        let block_size = self.superblock.blk_size();

        if blk_no + count > self.superblock.blk_count() {
            return Err(Ext4Error::Range {
                offset: blk_no * block_size,
                length: count * block_size,
                device_size: self.device.size(),
            });
        }

        self.device
            .read(blk_no * block_size, (count * block_size) as usize)
    }

    /// Returns the descriptor of block group `group`.
    ///
    /// Descriptors are materialised lazily and kept in a bounded
    /// most-recently-used cache on the session.
    pub fn block_group_descriptor(&self, group: BlockGroupNumber) -> Ext4Result<GroupDescriptor> {
        if group.0 >= self.superblock.bg_count() {
            return Err(Ext4Error::Argument(format!(
                "block group {group} out of range (filesystem has {} groups)",
                self.superblock.bg_count()
            )));
        }

        if let Some(bgd) = self.cached_bgd(group) {
            return Ok(bgd);
        }

        let bgd = self.load_bgd(group)?;

        let mut cache = self.bgd_cache.borrow_mut();
        if cache.len() == BGD_CACHE_CAPACITY {
            cache.pop_back();
        }
        cache.push_front((group, bgd));

        Ok(bgd)
    }

    /// Looks `group` up in the descriptor cache, refreshing its recency.
    fn cached_bgd(&self, group: BlockGroupNumber) -> Option<GroupDescriptor> {
        let mut cache = self.bgd_cache.borrow_mut();
        let pos = cache.iter().position(|(g, _)| *g == group)?;

        let entry = cache.remove(pos)?;
        cache.push_front(entry);

        Some(entry.1)
    }

    /// Locates and decodes the descriptor of block group `group` on disk.
    ///
    /// With `sparse_super`, all descriptors are packed in block group 0
    /// right after the superblock. Without it, `flex_bg` places each flex
    /// bundle's descriptors at the start of the bundle's first group. The
    /// plain ext2-style layout carries neither flag and is not
    /// implemented.
    fn load_bgd(&self, group: BlockGroupNumber) -> Ext4Result<GroupDescriptor> {
        let sb = &self.superblock;
        let block_size = sb.blk_size();
        let bgd_size = sb.bgd_size();
        let bgd_per_block = block_size / bgd_size;
        let first_data_block = u64::from(sb.first_data_block);
        let g = u64::from(group.0);

        let sparse_super = sb.has_ro_compat(ReadOnlyCompatibleFeatureSet::SPARSE_SUPER);

        let (block_no, offset_in_block) = if sparse_super {
            (
                first_data_block + 1 + g / bgd_per_block,
                (g % bgd_per_block) * bgd_size,
            )
        } else if sb.has_incompat(IncompatibleFeatureSet::FLEX_BG) {
            let index_in_flex = g % sb.groups_per_flex();
            let main = g - index_in_flex;
            let sb_size =
                u64::from(BlockGroupNumber(main as u32).holds_backup_superblock(sparse_super));

            (
                first_data_block
                    + main * u64::from(sb.blocks_per_group)
                    + sb_size
                    + index_in_flex / bgd_per_block,
                (index_in_flex % bgd_per_block) * bgd_size,
            )
        } else {
            return Err(Ext4Error::Unsupported(
                "block group descriptor layout without sparse_super or flex_bg",
            ));
        };

        let raw_block = self.read_block(block_no)?;
        let raw_bgd = &raw_block[offset_in_block as usize..(offset_in_block + bgd_size) as usize];

        let bgd = GroupDescriptor::decode(raw_bgd);

        if self.verify_checksums {
            bgd.verify_checksum(sb, group)?;
        }

        Ok(bgd)
    }

    /// Reads the raw on-disk record of inode `inode_no` (`s_inode_size`
    /// bytes from the owning group's inode table).
    pub fn read_inode_record(&self, inode_no: InodeNumber) -> Ext4Result<Vec<u8>> {
        let sb = &self.superblock;
        let inodes_count = sb.inodes_count;

        if inode_no.0 == 0 || inode_no.0 > inodes_count {
            return Err(Ext4Error::Argument(format!(
                "inode number {inode_no} out of range (filesystem has {inodes_count} inodes)"
            )));
        }

        let group = BlockGroupNumber((inode_no.0 - 1) / sb.inodes_per_group);
        let index = u64::from((inode_no.0 - 1) % sb.inodes_per_group);

        let bgd = self.block_group_descriptor(group)?;
        let inode_size = u64::from(sb.inode_size);
        let pos = bgd.inode_table_blk_addr() * sb.blk_size() + index * inode_size;

        self.device.read(pos, inode_size as usize)
    }

    /// Reads and decodes inode `inode_no`.
    pub fn inode(&self, inode_no: InodeNumber) -> Ext4Result<Inode> {
        let sb = &self.superblock;
        let raw = self.read_inode_record(inode_no)?;
        let inode = Inode::decode(&raw);

        let inode_size = u64::from(sb.inode_size);
        let extra_isize = u64::from(inode.i_extra_isize);
        if extra_isize > inode_size.saturating_sub(INODE_BASE_SIZE as u64) {
            return Err(Ext4Error::Corruption(format!(
                "inode {inode_no} declares {extra_isize} extra bytes, record holds {inode_size}"
            )));
        }

        if self.verify_checksums && sb.has_metadata_csum() {
            inode.verify_checksum(&raw, sb, inode_no, self.csum_seed)?;
        }

        Ok(inode)
    }

    /// The root directory of the filesystem.
    pub fn root_dir(&self) -> Ext4Result<Directory> {
        match self.file("/")? {
            File::Directory(dir) => Ok(dir),
            _ => Err(Ext4Error::Corruption(
                "root inode is not a directory".into(),
            )),
        }
    }

    /// Resolves an absolute POSIX path to the file it names.
    ///
    /// Path components are looked up by linear scan of directory entries,
    /// comparing raw name bytes. Fails with:
    /// - [`Ext4Error::Argument`] when the path is not absolute,
    /// - [`Ext4Error::NotFound`] when a component is absent,
    /// - [`Ext4Error::NotADirectory`] when a non-terminal component is not
    ///   a directory.
    pub fn file(&self, path: &str) -> Ext4Result<File> {
        let remainder = path
            .strip_prefix('/')
            .ok_or_else(|| Ext4Error::Argument(format!("path {path:?} is not absolute")))?;

        let root_inode = self.inode(InodeNumber::ROOT_DIR)?;
        let root = File::from_inode("/".into(), InodeNumber::ROOT_DIR, root_inode)?;

        if remainder.is_empty() {
            return Ok(root);
        }

        let mut components: Vec<&str> = remainder.split('/').collect();

        // A trailing slash names the same file but requires a directory.
        let trailing_slash = components.len() > 1 && components.last() == Some(&"");
        if trailing_slash {
            components.pop();
        }

        let mut current = root;
        let last = components.len() - 1;

        for (depth, component) in components.iter().enumerate() {
            let dir = match current {
                File::Directory(dir) => dir,
                _ => return Err(Ext4Error::NotADirectory(current.path().to_owned())),
            };

            let full_path = if dir.path() == "/" {
                format!("/{component}")
            } else {
                format!("{}/{component}", dir.path())
            };

            let entry = dir
                .lookup(self, component.as_bytes())?
                .ok_or_else(|| Ext4Error::NotFound(full_path.clone()))?;

            let inode = self.inode(entry.inode_no)?;
            current = File::from_inode(full_path, entry.inode_no, inode)?;

            if depth == last && trailing_slash && !matches!(current, File::Directory(_)) {
                return Err(Ext4Error::NotADirectory(current.path().to_owned()));
            }
        }

        Ok(current)
    }
}
