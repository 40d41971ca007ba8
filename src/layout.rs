//! Offset planning: record lengths and the global prefix-sum.
//!
//! Every byte position in the archive is fixed here, before anything is
//! written. Each worker sums its own record lengths, contributes the total
//! to an exclusive prefix-sum across the team, and rebases its local running
//! offsets onto the result. Once `plan` returns, writes need no further
//! coordination: all record intervals are disjoint and gapless by
//! construction.

use crate::catalog::{EntryKind, FileList};
use crate::comm::CommHandle;
use crate::error::ArchiveError;
use crate::header::HEADER_LEN;

/// Tar block granularity.
pub const BLOCK_SIZE: u64 = 512;

/// Planned layout for one worker's list, fully determined before the first
/// write.
#[derive(Debug)]
pub struct OffsetPlan {
    /// Absolute archive offset of each entry's record, by ordinal.
    pub offsets: Vec<u64>,
    /// Record length (header plus padded data) of each entry, by ordinal.
    pub record_lens: Vec<u64>,
    /// Sum of this worker's record lengths.
    pub local_total: u64,
    /// Where this worker's first record begins.
    pub global_base: u64,
}

/// Bytes one entry occupies in the archive. Directories and symlinks are
/// header-only. For files whose size is not an exact block multiple the
/// reservation is four blocks past the truncated size, not one; the margin
/// covers the three header blocks plus the rounded-up tail.
pub fn record_len(kind: EntryKind, size: u64) -> u64 {
    match kind {
        EntryKind::Directory | EntryKind::Symlink => HEADER_LEN,
        EntryKind::File => {
            if size % BLOCK_SIZE == 0 {
                size + HEADER_LEN
            } else {
                (size / BLOCK_SIZE + 4) * BLOCK_SIZE
            }
        }
    }
}

/// Assign a globally unique, gapless offset to every entry in `list`.
///
/// The embedded prefix-sum is a blocking collective: no worker gets its plan
/// back until every worker has contributed its local total.
pub fn plan(list: &FileList, comm: &CommHandle) -> Result<OffsetPlan, ArchiveError> {
    let mut offsets = Vec::with_capacity(list.entries.len());
    let mut record_lens = Vec::with_capacity(list.entries.len());
    let mut local_total = 0u64;
    for entry in &list.entries {
        let len = record_len(entry.kind, entry.size);
        offsets.push(local_total);
        record_lens.push(len);
        local_total += len;
    }

    let global_base = comm.exscan_sum(local_total)?;
    for off in &mut offsets {
        *off += global_base;
    }

    Ok(OffsetPlan { offsets, record_lens, local_total, global_base })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_len_for_files() {
        // 1000 bytes: (1000/512 + 4) * 512, not a naive round-up.
        assert_eq!(record_len(EntryKind::File, 1000), 2560);
        // Exact multiples take the tight form.
        assert_eq!(record_len(EntryKind::File, 512), 512 + HEADER_LEN);
        assert_eq!(record_len(EntryKind::File, 0), HEADER_LEN);
        assert_eq!(record_len(EntryKind::File, 4096), 4096 + HEADER_LEN);
        assert_eq!(record_len(EntryKind::File, 513), (513 / 512 + 4) * 512);
    }

    #[test]
    fn record_len_for_metadata_entries() {
        assert_eq!(record_len(EntryKind::Directory, 0), HEADER_LEN);
        assert_eq!(record_len(EntryKind::Symlink, 0), HEADER_LEN);
    }

    #[test]
    fn data_region_is_block_aligned() {
        for size in [1u64, 511, 512, 513, 1000, 4095, 4096, 1 << 20] {
            let len = record_len(EntryKind::File, size);
            assert_eq!((len - HEADER_LEN) % BLOCK_SIZE, 0, "size {size}");
            assert!(len - HEADER_LEN >= size, "size {size}");
        }
    }
}
