//! Dump raw `ext4` on-disk structures for inspection.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use ext4_reader::block_grp::BlockGroupNumber;
use ext4_reader::{Ext4Error, Ext4Fs, Ext4Result, File, InodeNumber};

#[derive(Parser)]
#[command(name = "e4dump", about = "dump raw ext4 on-disk structures")]
struct Args {
    /// Path to the block device containing the ext4 filesystem
    block_device: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dump the superblock
    Superblock,

    /// Dump one block group descriptor
    BlockGroupDescriptor {
        /// Block group number
        group_no: u32,
    },

    /// Dump an inode
    Inode {
        /// Inode number
        inode_no: u32,

        /// What to dump about the inode
        #[arg(value_enum, default_value = "metadata")]
        action: InodeAction,
    },

    /// Hex-dump one filesystem block
    Block {
        /// Block number
        block_no: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InodeAction {
    Metadata,
    Blocks,
    Content,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("e4dump: {e}");
            exit_code(&e)
        }
    }
}

fn run(args: &Args) -> Ext4Result<()> {
    let mut fs = Ext4Fs::open(&args.block_device)?;
    // Dumps report checksum validity instead of aborting on it.
    fs.set_verify_checksums(false);

    match &args.command {
        Command::Superblock => dump_superblock(&fs, &args.block_device),
        Command::BlockGroupDescriptor { group_no } => {
            dump_block_group_descriptor(&fs, &args.block_device, BlockGroupNumber(*group_no))
        }
        Command::Inode { inode_no, action } => {
            dump_inode(&fs, InodeNumber(*inode_no), *action)
        }
        Command::Block { block_no } => dump_block(&fs, *block_no),
    }
}

fn dump_superblock(fs: &Ext4Fs, device: &Path) -> Ext4Result<()> {
    let sb = fs.superblock();
    let compat = sb.feature_compat;
    let incompat = sb.feature_incompat;
    let ro_compat = sb.feature_ro_compat;

    println!("Superblock of {}", device.display());
    println!("volume_name        {:?}", sb.volume_name());
    println!("uuid               {}", sb.fs_uuid());
    println!("inodes_count       {}", { sb.inodes_count });
    println!("blocks_count       {}", sb.blk_count());
    println!("block_size         {}", sb.blk_size());
    println!("blocks_per_group   {}", { sb.blocks_per_group });
    println!("inodes_per_group   {}", { sb.inodes_per_group });
    println!("inode_size         {}", { sb.inode_size });
    println!("desc_size          {}", sb.bgd_size());
    println!("groups_per_flex    {}", sb.groups_per_flex());
    println!("first_data_block   {}", { sb.first_data_block });
    println!("feature_compat     {}", compat.flag_names().join("|"));
    println!("feature_incompat   {}", incompat.flag_names().join("|"));
    println!("feature_ro_compat  {}", ro_compat.flag_names().join("|"));
    println!(
        "checksum           {}",
        if !sb.has_metadata_csum() {
            "absent"
        } else if sb.verify_checksum().is_ok() {
            "valid"
        } else {
            "INVALID"
        }
    );

    Ok(())
}

fn dump_block_group_descriptor(
    fs: &Ext4Fs,
    device: &Path,
    group: BlockGroupNumber,
) -> Ext4Result<()> {
    let bgd = fs.block_group_descriptor(group)?;

    println!(
        "Block group descriptor {group} of {}:",
        device.display()
    );
    println!("block_bitmap   {:#x}", bgd.block_bitmap_blk_addr());
    println!("inode_bitmap   {:#x}", bgd.inode_bitmap_blk_addr());
    println!("inode_table    {:#x}", bgd.inode_table_blk_addr());
    println!("free_blocks    {}", bgd.free_blk_count());
    println!("free_inodes    {}", bgd.free_inode_count());
    println!("used_dirs      {}", bgd.directory_count());
    println!("unused_inodes  {}", bgd.unused_inodes_count());
    println!(
        "checksum       {}",
        if bgd.verify_checksum(fs.superblock(), group).is_ok() {
            "valid"
        } else {
            "INVALID"
        }
    );

    Ok(())
}

fn dump_inode(fs: &Ext4Fs, inode_no: InodeNumber, action: InodeAction) -> Ext4Result<()> {
    let inode = fs.inode(inode_no)?;

    match action {
        InodeAction::Metadata => {
            let mode = inode.i_mode;
            let flags = inode.i_flags;

            println!("Inode {inode_no}:");
            println!("type        {}", inode.inode_type()?);
            println!("mode        {} ({:#06x})", mode, mode.0);
            println!("size        {}", inode.size());
            println!("blocks      {}", inode.blk_count());
            println!("links       {}", { inode.i_links_count });
            println!("uid         {}", inode.uid());
            println!("gid         {}", inode.gid());
            println!("flags       {}", flags.flag_names().join("|"));
            println!("atime       {}", inode.access_time());
            println!("mtime       {}", inode.modification_time());
            println!("ctime       {}", inode.change_time());
            println!("crtime      {}", inode.creation_time());
            println!(
                "checksum    {}",
                if !fs.superblock().has_metadata_csum() {
                    "absent"
                } else if inode
                    .verify_checksum(
                        &fs.read_inode_record(inode_no)?,
                        fs.superblock(),
                        inode_no,
                        fs.csum_seed(),
                    )
                    .is_ok()
                {
                    "valid"
                } else {
                    "INVALID"
                }
            );
        }
        InodeAction::Blocks => {
            let content = ext4_reader::FileContent::new(fs, &inode)?;
            println!(
                "Has an {} organized content",
                if inode.uses_extent_tree() {
                    "extent tree"
                } else {
                    "direct/indirect"
                }
            );
            let blocks: Vec<String> = content
                .block_numbers()
                .map(|b| format!("{b:#x}"))
                .collect();
            println!("Content block numbers: [{}]", blocks.join(", "));
        }
        InodeAction::Content => {
            let file = File::from_inode(format!("<inode {inode_no}>"), inode_no, inode)?;
            match file {
                File::Directory(dir) => {
                    println!("Is a directory, with entries (names & inodes):");
                    for entry in dir.entries(fs)? {
                        let entry = entry?;
                        println!("  {: <16}  {: >8}", entry.name, entry.inode_no);
                    }
                }
                _ => {
                    println!("Is not a directory; use e4cat for regular file contents");
                }
            }
        }
    }

    Ok(())
}

fn dump_block(fs: &Ext4Fs, block_no: u64) -> Ext4Result<()> {
    let block = fs.read_block(block_no)?;
    println!("Block number {block_no} ({} bytes):", block.len());

    for (line_no, line) in block.chunks(16).enumerate() {
        let offset = line_no * 16;
        print!("#{block_no:04X}:{offset:04X}  ");

        for chunk in line.chunks(8) {
            for byte in chunk {
                print!(" {byte:02x}");
            }
            print!("  ");
        }

        for chunk in line.chunks(8) {
            print!(
                "  {}",
                chunk
                    .iter()
                    .map(|&c| {
                        if c.is_ascii_graphic() {
                            char::from(c)
                        } else {
                            '.'
                        }
                    })
                    .collect::<String>()
            );
        }

        println!();
    }

    Ok(())
}

fn exit_code(err: &Ext4Error) -> ExitCode {
    match err {
        Ext4Error::NotFound(_) | Ext4Error::NotADirectory(_) | Ext4Error::Argument(_) => {
            ExitCode::from(1)
        }
        Ext4Error::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => ExitCode::from(1),
        _ => ExitCode::from(2),
    }
}
