//! Synthetic ext4 image builder for the validation suite.
//!
//! Produces a 1 MiB image with 1 KiB blocks and a single block group,
//! carrying `FILETYPE`, `EXTENTS`, `64BIT` and `FLEX_BG` plus
//! `METADATA_CSUM`. Every metadata checksum is computed with the crate's
//! own CRC primitives, which are themselves pinned by known-answer vectors.
//!
//! Image layout (1 KiB blocks):
//!
//! | block | content                       |
//! |-------|-------------------------------|
//! | 0     | boot area                     |
//! | 1     | superblock                    |
//! | 2     | group descriptor table        |
//! | 3, 4  | block / inode bitmaps (blank) |
//! | 5..21 | inode table (64 × 256 B)      |
//! | 21    | `/` directory data            |
//! | 22    | `/lost+found` data            |
//! | 23    | `/hello.txt` data             |
//! | 24..28| `/dir1/nested.bin` data       |
//! | 28    | `/dir1` directory data        |
//! | 29    | hash-tree root of `idx` dir   |
//! | 30    | `idx` directory entries       |
//! | 31    | `/dir1/legacy.txt` data       |

use std::io::Write;

use ext4_reader::csum::{crc32c, CRC32C_INIT};
use ext4_reader::{Ext4Fs, Ext4Result};
use tempfile::NamedTempFile;

pub const BLOCK_SIZE: usize = 1024;
pub const IMAGE_BLOCKS: usize = 1024;
pub const INODE_SIZE: usize = 256;
pub const INODE_COUNT: u32 = 64;

pub const UUID: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE,
    0xFF,
];

/// Absolute byte offset of the superblock.
pub const SB_OFFSET: usize = 0x400;

const BGD_BLOCK: usize = 2;
const ITABLE_BLOCK: usize = 5;

pub const ROOT_DIR_BLOCK: u64 = 21;
const LOST_FOUND_BLOCK: u64 = 22;
const HELLO_BLOCK: u64 = 23;
const NESTED_FIRST_BLOCK: u64 = 24;
const DIR1_BLOCK: u64 = 28;
const DX_ROOT_BLOCK: u64 = 29;
const DX_DATA_BLOCK: u64 = 30;
const LEGACY_BLOCK: u64 = 31;

pub const ROOT_INO: u32 = 2;
pub const LOST_FOUND_INO: u32 = 11;
pub const HELLO_INO: u32 = 12;
pub const DIR1_INO: u32 = 13;
pub const NESTED_INO: u32 = 14;
pub const IDX_INO: u32 = 15;
pub const EMPTY_INO: u32 = 16;
pub const LEGACY_INO: u32 = 17;
pub const LINK_INO: u32 = 18;

const S_IFDIR: u16 = 0x4000;
const S_IFREG: u16 = 0x8000;
const S_IFLNK: u16 = 0xA000;

const FLAG_INDEX: u32 = 0x1000;
const FLAG_EXTENTS: u32 = 0x80000;

fn put16(img: &mut [u8], offset: usize, value: u16) {
    img[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put32(img: &mut [u8], offset: usize, value: u32) {
    img[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// An `i_block` area holding a depth-0 extent tree.
fn extent_root(extents: &[(u32, u16, u64)]) -> [u8; 60] {
    assert!(extents.len() <= 4);

    let mut root = [0u8; 60];
    put16(&mut root, 0, 0xF30A);
    put16(&mut root, 2, extents.len() as u16);
    put16(&mut root, 4, 4);

    for (i, &(logical, len, start)) in extents.iter().enumerate() {
        let off = 12 + i * 12;
        put32(&mut root, off, logical);
        put16(&mut root, off + 4, len);
        put16(&mut root, off + 6, (start >> 32) as u16);
        put32(&mut root, off + 8, start as u32);
    }

    root
}

/// A directory data block; the last entry's stride stretches to the block
/// end.
fn dir_block(entries: &[(u32, &str, u8)]) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    let mut offset = 0;

    for (i, &(ino, name, file_type)) in entries.iter().enumerate() {
        let rec_len = if i == entries.len() - 1 {
            BLOCK_SIZE - offset
        } else {
            (8 + name.len() + 3) & !3
        };

        put32(&mut block, offset, ino);
        put16(&mut block, offset + 4, rec_len as u16);
        block[offset + 6] = name.len() as u8;
        block[offset + 7] = file_type;
        block[offset + 8..offset + 8 + name.len()].copy_from_slice(name.as_bytes());

        offset += rec_len;
    }
    assert_eq!(offset, BLOCK_SIZE);

    block
}

fn write_inode(img: &mut [u8], ino: u32, mode: u16, size: u64, flags: u32, i_block: &[u8; 60]) {
    let base = ITABLE_BLOCK * BLOCK_SIZE + (ino as usize - 1) * INODE_SIZE;

    put16(img, base, mode);
    put32(img, base + 0x04, size as u32);
    put32(img, base + 0x10, 1_700_000_000); // i_mtime
    put16(img, base + 0x1A, 1); // i_links_count
    put32(img, base + 0x1C, (size.div_ceil(512)) as u32); // i_blocks_lo
    put32(img, base + 0x20, flags);
    img[base + 0x28..base + 0x64].copy_from_slice(i_block);
    put32(img, base + 0x6C, (size >> 32) as u32);
}

/// Computes and stores the checksum of every inode record.
///
/// The CRC is seeded with the filesystem seed, then covers the inode
/// number, the generation, and the full record with both checksum fields
/// zeroed.
fn checksum_inodes(img: &mut [u8], seed: u32) {
    for ino in 1..=INODE_COUNT {
        let base = ITABLE_BLOCK * BLOCK_SIZE + (ino as usize - 1) * INODE_SIZE;

        // Every record carries the extension, so both checksum halves
        // exist.
        put16(img, base + 0x80, 32); // i_extra_isize
        put16(img, base + 0x7C, 0);
        put16(img, base + 0x82, 0);

        let record = &img[base..base + INODE_SIZE];
        let generation = &record[0x64..0x68];

        let mut crc = crc32c(&ino.to_le_bytes(), seed);
        crc = crc32c(generation, crc);
        crc = crc32c(record, crc);

        put16(img, base + 0x7C, crc as u16);
        put16(img, base + 0x82, (crc >> 16) as u16);
    }
}

fn write_superblock(img: &mut [u8]) {
    let sb = &mut img[SB_OFFSET..SB_OFFSET + 1024];

    put32(sb, 0x00, INODE_COUNT); // inodes_count
    put32(sb, 0x04, IMAGE_BLOCKS as u32); // blocks_count_lo
    put32(sb, 0x10, 40); // free_inodes_count
    put32(sb, 0x14, 1); // first_data_block
    put32(sb, 0x18, 0); // log_block_size (1 KiB)
    put32(sb, 0x20, 8192); // blocks_per_group
    put32(sb, 0x28, INODE_COUNT); // inodes_per_group
    put16(sb, 0x38, 0xEF53); // magic
    put16(sb, 0x3A, 0x1); // state: cleanly unmounted
    put32(sb, 0x48, 0); // creator_os: Linux
    put32(sb, 0x4C, 1); // rev_level
    put32(sb, 0x54, 11); // first_ino
    put16(sb, 0x58, INODE_SIZE as u16); // inode_size
    // FILETYPE | EXTENTS | 64BIT | FLEX_BG
    put32(sb, 0x60, 0x2 | 0x40 | 0x80 | 0x200);
    put32(sb, 0x64, 0x400); // ro_compat: METADATA_CSUM
    sb[0x68..0x78].copy_from_slice(&UUID);
    sb[0x78..0x7F].copy_from_slice(b"testimg"); // volume_name
    put16(sb, 0xFE, 64); // desc_size
    sb[0x174] = 4; // log_groups_per_flex
    sb[0x175] = 1; // checksum_type: crc32c

    let checksum = crc32c(&sb[..0x3FC], CRC32C_INIT);
    put32(sb, 0x3FC, checksum);
}

fn write_bgd(img: &mut [u8]) {
    let base = BGD_BLOCK * BLOCK_SIZE;

    put32(img, base, 3); // block_bitmap_lo
    put32(img, base + 0x04, 4); // inode_bitmap_lo
    put32(img, base + 0x08, ITABLE_BLOCK as u32); // inode_table_lo
    put16(img, base + 0x0C, 992); // free_blocks_count_lo
    put16(img, base + 0x0E, 40); // free_inodes_count_lo
    put16(img, base + 0x10, 4); // used_dirs_count_lo

    let bgd = img[base..base + 64].to_vec();
    let mut input = Vec::new();
    input.extend_from_slice(&UUID);
    input.extend_from_slice(&0u32.to_le_bytes());
    input.extend_from_slice(&bgd[..0x1E]);
    input.extend_from_slice(&[0, 0]);
    input.extend_from_slice(&bgd[0x20..]);

    let checksum = crc32c(&input, CRC32C_INIT) as u16;
    put16(img, base + 0x1E, checksum);
}

/// Builds the complete image in memory.
pub fn build_image() -> Vec<u8> {
    let mut img = vec![0u8; IMAGE_BLOCKS * BLOCK_SIZE];

    write_superblock(&mut img);
    write_bgd(&mut img);

    // Directory data.
    let root = dir_block(&[
        (ROOT_INO, ".", 2),
        (ROOT_INO, "..", 2),
        (LOST_FOUND_INO, "lost+found", 2),
        (HELLO_INO, "hello.txt", 1),
        (DIR1_INO, "dir1", 2),
    ]);
    let lost_found = dir_block(&[(LOST_FOUND_INO, ".", 2), (ROOT_INO, "..", 2)]);
    let dir1 = dir_block(&[
        (DIR1_INO, ".", 2),
        (ROOT_INO, "..", 2),
        (NESTED_INO, "nested.bin", 1),
        (EMPTY_INO, "empty.bin", 1),
        (LEGACY_INO, "legacy.txt", 1),
        (LINK_INO, "link", 7),
    ]);

    let blk = |n: u64| (n as usize) * BLOCK_SIZE;

    img[blk(ROOT_DIR_BLOCK)..blk(ROOT_DIR_BLOCK) + BLOCK_SIZE].copy_from_slice(&root);
    img[blk(LOST_FOUND_BLOCK)..blk(LOST_FOUND_BLOCK) + BLOCK_SIZE].copy_from_slice(&lost_found);
    img[blk(DIR1_BLOCK)..blk(DIR1_BLOCK) + BLOCK_SIZE].copy_from_slice(&dir1);

    // File data.
    img[blk(HELLO_BLOCK)..blk(HELLO_BLOCK) + 12].copy_from_slice(b"hello world\n");
    img[blk(NESTED_FIRST_BLOCK)..blk(NESTED_FIRST_BLOCK) + 4096].fill(0xA5);
    img[blk(LEGACY_BLOCK)..blk(LEGACY_BLOCK) + 5].copy_from_slice(b"lgcy\n");

    // Hash-tree root of the `idx` directory: dot and dotdot disguised as
    // ordinary entries, then the index info and one (hash, block) pair.
    {
        let base = blk(DX_ROOT_BLOCK);
        put32(&mut img, base, IDX_INO);
        put16(&mut img, base + 4, 12);
        img[base + 6] = 1;
        img[base + 7] = 2;
        img[base + 8] = b'.';

        put32(&mut img, base + 12, ROOT_INO);
        put16(&mut img, base + 16, (BLOCK_SIZE - 12) as u16);
        img[base + 18] = 2;
        img[base + 19] = 2;
        img[base + 20..base + 22].copy_from_slice(b"..");

        // dx_root_info at 0x18.
        img[base + 0x1C] = 1; // hash_version: half_md4
        img[base + 0x1D] = 8; // info_length
        img[base + 0x1E] = 0; // indirect_levels
        put16(&mut img, base + 0x20, 124); // limit
        put16(&mut img, base + 0x22, 1); // count
        put32(&mut img, base + 0x24, 1); // block of the first bucket
    }
    let dx_data = dir_block(&[(HELLO_INO, "a.txt", 1)]);
    img[blk(DX_DATA_BLOCK)..blk(DX_DATA_BLOCK) + BLOCK_SIZE].copy_from_slice(&dx_data);

    // Inode table.
    write_inode(
        &mut img,
        1, // defective blocks inode, present but empty
        0,
        0,
        0,
        &[0u8; 60],
    );
    write_inode(
        &mut img,
        ROOT_INO,
        S_IFDIR | 0o755,
        BLOCK_SIZE as u64,
        FLAG_EXTENTS,
        &extent_root(&[(0, 1, ROOT_DIR_BLOCK)]),
    );
    write_inode(
        &mut img,
        LOST_FOUND_INO,
        S_IFDIR | 0o700,
        BLOCK_SIZE as u64,
        FLAG_EXTENTS,
        &extent_root(&[(0, 1, LOST_FOUND_BLOCK)]),
    );
    write_inode(
        &mut img,
        HELLO_INO,
        S_IFREG | 0o644,
        12,
        FLAG_EXTENTS,
        &extent_root(&[(0, 1, HELLO_BLOCK)]),
    );
    write_inode(
        &mut img,
        DIR1_INO,
        S_IFDIR | 0o755,
        BLOCK_SIZE as u64,
        FLAG_EXTENTS,
        &extent_root(&[(0, 1, DIR1_BLOCK)]),
    );
    write_inode(
        &mut img,
        NESTED_INO,
        S_IFREG | 0o600,
        4096,
        FLAG_EXTENTS,
        &extent_root(&[(0, 4, NESTED_FIRST_BLOCK)]),
    );
    write_inode(
        &mut img,
        IDX_INO,
        S_IFDIR | 0o755,
        2 * BLOCK_SIZE as u64,
        FLAG_EXTENTS | FLAG_INDEX,
        &extent_root(&[(0, 2, DX_ROOT_BLOCK)]),
    );
    write_inode(
        &mut img,
        EMPTY_INO,
        S_IFREG | 0o644,
        0,
        FLAG_EXTENTS,
        &extent_root(&[]),
    );

    let mut legacy_map = [0u8; 60];
    put32(&mut legacy_map, 0, LEGACY_BLOCK as u32);
    write_inode(&mut img, LEGACY_INO, S_IFREG | 0o644, 5, 0, &legacy_map);

    let mut link_target = [0u8; 60];
    link_target[..10].copy_from_slice(b"nested.bin");
    write_inode(&mut img, LINK_INO, S_IFLNK | 0o777, 10, 0, &link_target);

    let seed = crc32c(&UUID, CRC32C_INIT);
    checksum_inodes(&mut img, seed);

    img
}

/// Writes `image` to a temp file and opens it; the temp file must outlive
/// the session.
pub fn open_image(image: &[u8]) -> Ext4Result<(NamedTempFile, Ext4Fs)> {
    let mut file = NamedTempFile::new().expect("cannot create temp image");
    file.write_all(image).expect("cannot write temp image");
    file.flush().expect("cannot flush temp image");

    let fs = Ext4Fs::open(file.path())?;
    Ok((file, fs))
}

/// Builds the reference image and opens it.
pub fn open_fs() -> (NamedTempFile, Ext4Fs) {
    open_image(&build_image()).expect("reference image does not open")
}

/// Builds the reference image, lets `tweak` corrupt it, and opens the
/// result.
pub fn open_tweaked(
    tweak: impl FnOnce(&mut Vec<u8>),
) -> Ext4Result<(NamedTempFile, Ext4Fs)> {
    let mut image = build_image();
    tweak(&mut image);
    open_image(&image)
}
