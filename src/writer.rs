//! Shared output file: positioned writes from every worker, no locking.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ArchiveError;

/// Tar end-of-archive trailer: two zero-filled 512-byte blocks.
pub const TRAILER_LEN: u64 = 1024;

/// The one output file all workers write into. There is no internal
/// synchronization; callers own disjoint byte ranges, established by the
/// offset plan, and never write the same region twice.
#[derive(Debug)]
pub struct SharedWriter {
    file: File,
    path: PathBuf,
}

impl SharedWriter {
    /// Create (or truncate) the archive at `path`.
    pub fn create(path: &Path) -> Result<Self, ArchiveError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| ArchiveError::Io { source: e, path: path.to_path_buf() })?;
        Ok(SharedWriter { file, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `bytes` at the absolute archive offset.
    pub fn positioned_write(&self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        write_all_at(&self.file, bytes, offset)
    }

    /// Append the end-of-archive trailer at `size` and flush everything to
    /// disk. Regions skipped by padding become holes and read back as
    /// zeroes.
    pub fn finalize(&self, size: u64) -> Result<(), ArchiveError> {
        let trailer = [0u8; TRAILER_LEN as usize];
        self.positioned_write(size, &trailer).map_err(|e| ArchiveError::Copy {
            source: e,
            path: self.path.clone(),
            offset: size,
        })?;
        self.file
            .sync_all()
            .map_err(|e| ArchiveError::Io { source: e, path: self.path.clone() })?;
        Ok(())
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, bytes: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(bytes, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, bytes: &[u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut buf = bytes;
    let mut pos = offset;
    while !buf.is_empty() {
        match file.seek_write(buf, pos)? {
            0 => return Err(io::ErrorKind::WriteZero.into()),
            n => {
                buf = &buf[n..];
                pos += n as u64;
            }
        }
    }
    Ok(())
}
