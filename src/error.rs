//! Error types raised while reading an `ext4` filesystem.
//!
//! Every fallible operation in the crate returns an [`Ext4Result`]. Decoders
//! never retry and never mask a failure: a call either produces a complete,
//! valid value or surfaces one of the [`Ext4Error`] kinds below.

use thiserror::Error;

/// Return type for every fallible operation of the crate.
pub type Ext4Result<T> = Result<T, Ext4Error>;

/// Errors raised while opening or reading an `ext4` filesystem.
#[derive(Debug, Error)]
pub enum Ext4Error {
    /// A read from the underlying device failed.
    #[error("device read failed: {0}")]
    Io(#[from] std::io::Error),

    /// An offset or length fell out of the device bounds.
    #[error("read of {length} bytes at offset {offset:#x} exceeds device size {device_size:#x}")]
    Range {
        offset: u64,
        length: u64,
        device_size: u64,
    },

    /// A checksum mismatch, or an invalid magic number.
    #[error("corrupted filesystem structure: {0}")]
    Corruption(String),

    /// An on-disk feature or layout the reader does not implement.
    #[error("unsupported filesystem feature: {0}")]
    Unsupported(&'static str),

    /// A path component does not exist.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// A non-terminal path component is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A name or timestamp could not be interpreted.
    #[error("undecodable field: {0}")]
    Decoding(String),

    /// Caller-supplied input violated a precondition.
    #[error("invalid argument: {0}")]
    Argument(String),
}
