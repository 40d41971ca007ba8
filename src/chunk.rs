//! Chunk scheduling and copying: the dynamic half of the write phase.
//!
//! Each file entry's data region is cut into fixed-size chunks; every chunk
//! becomes one work item on the distribution queue and lands at an absolute
//! archive offset computed entirely from the plan. A worker handles one item
//! at a time, as a single blocking read followed by one positioned write.

use std::fs::File;
use std::path::PathBuf;

use log::debug;

use crate::catalog::{EntryKind, FileList};
use crate::error::ArchiveError;
use crate::header::HEADER_LEN;
use crate::layout::OffsetPlan;
use crate::queue::Submitter;
use crate::writer::SharedWriter;

/// One unit of copy work: a bounded slice of one source file bound for a
/// fixed position in the archive. Reprocessing an item writes the same
/// bytes to the same place, so redelivery is harmless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWorkItem {
    pub source: PathBuf,
    pub chunk_index: u64,
    /// Offset of this chunk within the source file.
    pub offset_in_file: u64,
    pub len: u64,
    /// Absolute archive offset the chunk lands at.
    pub dest_offset: u64,
}

/// Split every file entry of `list` into chunk items and hand them to the
/// queue. Invoked exactly once per worker when the copy phase opens; empty
/// files submit nothing.
pub fn submit_chunks(
    list: &FileList,
    plan: &OffsetPlan,
    chunk_size: u64,
    queue: &Submitter<ChunkWorkItem>,
) {
    for entry in &list.entries {
        if entry.kind != EntryKind::File {
            continue;
        }
        let data_base = plan.offsets[entry.ordinal] + HEADER_LEN;
        let mut index = 0u64;
        let mut copied = 0u64;
        while copied < entry.size {
            let len = chunk_size.min(entry.size - copied);
            queue.submit(ChunkWorkItem {
                source: entry.path.clone(),
                chunk_index: index,
                offset_in_file: copied,
                len,
                dest_offset: data_base + index * chunk_size,
            });
            index += 1;
            copied += len;
        }
    }
}

/// Copy one chunk into the archive.
pub fn copy_chunk(item: &ChunkWorkItem, writer: &SharedWriter) -> Result<(), ArchiveError> {
    let file = File::open(&item.source)
        .map_err(|e| ArchiveError::Io { source: e, path: item.source.clone() })?;
    let mut buf = vec![0u8; item.len as usize];
    read_exact_at(&file, &mut buf, item.offset_in_file).map_err(|e| ArchiveError::Copy {
        source: e,
        path: item.source.clone(),
        offset: item.dest_offset,
    })?;
    writer
        .positioned_write(item.dest_offset, &buf)
        .map_err(|e| ArchiveError::Copy {
            source: e,
            path: item.source.clone(),
            offset: item.dest_offset,
        })?;
    debug!(
        "chunk {} of '{}' ({} bytes) at offset {}",
        item.chunk_index,
        item.source.display(),
        item.len,
        item.dest_offset
    );
    Ok(())
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut filled = 0usize;
    while filled < buf.len() {
        match file.seek_read(&mut buf[filled..], offset + filled as u64)? {
            0 => return Err(std::io::ErrorKind::UnexpectedEof.into()),
            n => filled += n,
        }
    }
    Ok(())
}
