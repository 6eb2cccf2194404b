//! Random-access byte reads from the backing block device or disk image.

use std::fs;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::{Ext4Error, Ext4Result};

/// A read-only handle over a block device or disk image.
///
/// The handle is exclusively owned by a single filesystem session, which
/// serialises reads; independent sessions on the same device hold
/// independent handles. It is released when the owning session is dropped.
#[derive(Debug)]
pub struct BlockDevice {
    file: fs::File,
    size: u64,
}

impl BlockDevice {
    /// Opens the device at `path` read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Ext4Result<Self> {
        let file = fs::File::open(path)?;
        let size = file.metadata()?.len();

        Ok(Self { file, size })
    }

    /// Size of the device, in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads `length` bytes starting at the absolute byte `offset`.
    ///
    /// The read is positional and does not disturb any cursor. Fails with
    /// [`Ext4Error::Range`] if `offset + length` exceeds the device size,
    /// and with [`Ext4Error::Io`] on an underlying OS error.
    pub fn read(&self, offset: u64, length: usize) -> Ext4Result<Vec<u8>> {
        let end = offset
            .checked_add(length as u64)
            .ok_or(Ext4Error::Range {
                offset,
                length: length as u64,
                device_size: self.size,
            })?;

        if end > self.size {
            return Err(Ext4Error::Range {
                offset,
                length: length as u64,
                device_size: self.size,
            });
        }

        let mut buf = vec![0u8; length];
        self.file.read_exact_at(&mut buf, offset)?;

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn device_with(contents: &[u8]) -> (tempfile::NamedTempFile, BlockDevice) {
        let mut img = tempfile::NamedTempFile::new().unwrap();
        img.write_all(contents).unwrap();
        img.flush().unwrap();
        let dev = BlockDevice::open(img.path()).unwrap();
        (img, dev)
    }

    #[test]
    fn read_within_bounds() {
        let (_img, dev) = device_with(b"0123456789");
        assert_eq!(dev.read(2, 4).unwrap(), b"2345");
        assert_eq!(dev.size(), 10);
    }

    #[test]
    fn read_past_end_is_a_range_error() {
        let (_img, dev) = device_with(b"0123456789");
        assert!(matches!(
            dev.read(8, 4),
            Err(Ext4Error::Range { offset: 8, .. })
        ));
    }

    #[test]
    fn read_with_overflowing_offset_is_a_range_error() {
        let (_img, dev) = device_with(b"0123456789");
        assert!(matches!(
            dev.read(u64::MAX, 2),
            Err(Ext4Error::Range { .. })
        ));
    }
}
