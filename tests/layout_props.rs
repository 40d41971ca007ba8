use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;

use partar::catalog::{Entry, EntryKind, FileList};
use partar::chunk::{self, ChunkWorkItem};
use partar::comm::Comm;
use partar::header::HEADER_LEN;
use partar::layout::{self, record_len};
use partar::queue::WorkPool;

fn entry(ordinal: usize, kind: EntryKind, size: u64) -> Entry {
    Entry {
        ordinal,
        path: PathBuf::from(format!("/src/e{ordinal}")),
        name: format!("e{ordinal}"),
        kind,
        size,
        mode: 0o644,
        uid: 0,
        gid: 0,
        mtime: 0,
        link_target: None,
    }
}

#[test]
fn offsets_are_disjoint_and_gapless_across_workers() {
    let lists = vec![
        FileList {
            entries: vec![
                entry(0, EntryKind::File, 1000),
                entry(1, EntryKind::Directory, 0),
            ],
        },
        FileList {
            entries: vec![
                entry(0, EntryKind::File, 512),
                entry(1, EntryKind::Symlink, 0),
            ],
        },
    ];
    let comm = Comm::new(2);
    let intervals = Mutex::new(Vec::new());
    let totals = Mutex::new(Vec::new());

    thread::scope(|s| {
        for (rank, list) in lists.iter().enumerate() {
            let handle = comm.handle(rank);
            let intervals = &intervals;
            let totals = &totals;
            s.spawn(move || {
                let plan = layout::plan(list, &handle).unwrap();
                for (off, len) in plan.offsets.iter().zip(&plan.record_lens) {
                    intervals.lock().unwrap().push((*off, *len));
                }
                let archive_size = handle.allreduce_sum(plan.local_total).unwrap();
                totals.lock().unwrap().push((rank, plan.global_base, archive_size));
            });
        }
    });

    let mut intervals = intervals.into_inner().unwrap();
    intervals.sort_unstable();
    // Union is contiguous from zero.
    let mut cursor = 0u64;
    for (off, len) in &intervals {
        assert_eq!(*off, cursor);
        cursor += len;
    }

    let mut totals = totals.into_inner().unwrap();
    totals.sort_unstable();
    // Worker 0 plans 2560 + 1536 bytes, so worker 1 starts at 4096.
    assert_eq!(totals[0].1, 0);
    assert_eq!(totals[1].1, 4096);
    // Both see the same reduced size, equal to the end of the last record.
    assert_eq!(totals[0].2, totals[1].2);
    assert_eq!(totals[0].2, cursor);
    assert_eq!(cursor, 4096 + record_len(EntryKind::File, 512) + HEADER_LEN);
}

#[test]
fn single_worker_offsets_increase_with_ordinal() {
    let list = FileList {
        entries: vec![
            entry(0, EntryKind::Directory, 0),
            entry(1, EntryKind::File, 1),
            entry(2, EntryKind::File, 1024),
            entry(3, EntryKind::Symlink, 0),
        ],
    };
    let comm = Comm::new(1);
    let plan = layout::plan(&list, &comm.handle(0)).unwrap();
    assert_eq!(plan.global_base, 0);
    for pair in plan.offsets.windows(2) {
        assert!(pair[0] < pair[1]);
    }
    let expected: u64 = plan.record_lens.iter().sum();
    assert_eq!(plan.local_total, expected);
}

#[test]
fn chunks_map_to_disjoint_absolute_ranges() {
    // One 10000-byte file cut into 4096-byte chunks.
    let list = FileList { entries: vec![entry(0, EntryKind::File, 10000)] };
    let comm = Comm::new(1);
    let plan = layout::plan(&list, &comm.handle(0)).unwrap();

    let pool: WorkPool<ChunkWorkItem> = WorkPool::new(1);
    let items = Mutex::new(Vec::new());
    pool.run(
        |q| chunk::submit_chunks(&list, &plan, 4096, q),
        |_q, item| {
            items.lock().unwrap().push(item);
            Ok(())
        },
    )
    .unwrap();

    let mut items = items.into_inner().unwrap();
    items.sort_by_key(|i| i.chunk_index);
    assert_eq!(items.len(), 3);
    assert_eq!(
        items.iter().map(|i| i.offset_in_file).collect::<Vec<_>>(),
        vec![0, 4096, 8192]
    );
    assert_eq!(items.iter().map(|i| i.len).collect::<Vec<_>>(), vec![4096, 4096, 1808]);
    for item in &items {
        assert_eq!(item.dest_offset, HEADER_LEN + item.chunk_index * 4096);
    }
}

#[test]
fn empty_files_submit_no_chunks() {
    let list = FileList { entries: vec![entry(0, EntryKind::File, 0)] };
    let comm = Comm::new(1);
    let plan = layout::plan(&list, &comm.handle(0)).unwrap();
    let pool: WorkPool<ChunkWorkItem> = WorkPool::new(1);
    let mut count = 0u32;
    pool.run(
        |q| chunk::submit_chunks(&list, &plan, 4096, q),
        |_q, _item| {
            count += 1;
            Ok(())
        },
    )
    .unwrap();
    assert_eq!(count, 0);
}
