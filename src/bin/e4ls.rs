//! List directory contents of an `ext4` filesystem.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ext4_reader::time::DateTime;
use ext4_reader::{Ext4Error, Ext4Fs, Ext4Result, File};

#[derive(Parser)]
#[command(name = "e4ls", about = "list directory contents")]
struct Args {
    /// Path to the block device containing the ext4 filesystem
    block_device: PathBuf,

    /// Do not ignore entries starting with .
    #[arg(short = 'a', long = "all")]
    show_hidden: bool,

    /// Use a long listing format
    #[arg(short = 'l')]
    long_format: bool,

    /// List information about the FILE
    #[arg(value_name = "FILE")]
    path: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("e4ls: {e}");
            exit_code(&e)
        }
    }
}

fn run(args: &Args) -> Ext4Result<()> {
    let fs = Ext4Fs::open(&args.block_device)?;

    let file = fs.file(&args.path)?;
    let mut files = match &file {
        File::Directory(dir) => {
            let mut files = Vec::new();
            for entry in dir.entries(&fs)? {
                let entry = entry?;
                let name = entry.name.as_str()?;

                if !args.show_hidden && entry.name.is_hidden() {
                    continue;
                }

                let full_path = if dir.path() == "/" {
                    format!("/{name}")
                } else {
                    format!("{}/{name}", dir.path())
                };
                let inode = fs.inode(entry.inode_no)?;
                files.push(File::from_inode(full_path, entry.inode_no, inode)?);
            }
            files
        }
        _ => vec![file],
    };

    files.sort_by(|a, b| a.filename().cmp(b.filename()));

    if args.long_format {
        println!("total {}", files.len());
    }

    for file in &files {
        if args.long_format {
            let inode = file.inode();
            let mode = inode.i_mode;
            println!(
                "{}{} {: >2} {: >4} {: >4} {: >8} {} {}",
                type_char(file),
                mode,
                { inode.i_links_count },
                inode.uid(),
                inode.gid(),
                inode.size(),
                DateTime::from(inode.modification_time()),
                file.filename(),
            );
        } else {
            println!("{}", file.filename());
        }
    }

    Ok(())
}

fn type_char(file: &File) -> char {
    match file {
        File::Regular(_) => '-',
        File::Directory(_) => 'd',
        File::SymbolicLink(_) => 'l',
        File::CharacterDevice(_) => 'c',
        File::BlockDevice(_) => 'b',
        File::Fifo(_) => 'p',
        File::Socket(_) => 's',
    }
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
