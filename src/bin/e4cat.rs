//! Print a file from an `ext4` filesystem on the standard output.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ext4_reader::{Ext4Error, Ext4Fs, Ext4Result, File};

#[derive(Parser)]
#[command(name = "e4cat", about = "print a file on the standard output")]
struct Args {
    /// Path to the block device containing the ext4 filesystem
    block_device: PathBuf,

    /// Print FILE to standard output
    #[arg(value_name = "FILE")]
    path: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("e4cat: {e}");
            exit_code(&e)
        }
    }
}

fn run(args: &Args) -> Ext4Result<()> {
    let fs = Ext4Fs::open(&args.block_device)?;

    match fs.file(&args.path)? {
        File::Regular(file) => {
            let content = file.read_all(&fs)?;
            std::io::stdout().write_all(&content)?;
            Ok(())
        }
        _ => Err(Ext4Error::Argument(format!(
            "{}: is not a regular file",
            args.path
        ))),
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
