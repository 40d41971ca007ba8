//! Archive creation: the whole planning-and-copy pipeline.
//!
//! Every worker runs the same sequence: plan offsets (one blocking
//! collective), write its own headers, join the dynamic chunk-copy phase,
//! then contribute to the final size reduction. Worker 0 appends the
//! trailer once the reduction proves every write has landed.

use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use log::info;

use crate::catalog::{self, FileList};
use crate::chunk::{self, ChunkWorkItem};
use crate::comm::{Comm, CommHandle};
use crate::error::ArchiveError;
use crate::header::{self, HeaderOptions};
use crate::layout;
use crate::queue::WorkPool;
use crate::writer::{SharedWriter, TRAILER_LEN};

/// Settings for one create run.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub sources: Vec<PathBuf>,
    pub output: PathBuf,
    /// Worker thread count; 0 means one per CPU core.
    pub workers: usize,
    /// Chunk size in bytes.
    pub chunk_size: u64,
    pub preserve: bool,
}

/// What a finished run reports.
#[derive(Debug)]
pub struct CreateSummary {
    pub entries: usize,
    /// Final archive size, trailer included.
    pub archive_size: u64,
}

/// Build the archive described by `opts`.
///
/// All-or-nothing: the first worker failure tears the whole job down, and a
/// partially written output file is left behind as-is.
pub fn create_archive(opts: &CreateOptions) -> Result<CreateSummary, ArchiveError> {
    if opts.chunk_size == 0 {
        return Err(ArchiveError::InvalidArgument("chunk size must be positive".into()));
    }
    let started = Instant::now();
    let num_workers = if opts.workers == 0 { num_cpus::get() } else { opts.workers }.max(1);

    let writer = SharedWriter::create(&opts.output)?;
    let list = catalog::scan(&opts.sources)?;
    let total_entries = list.entries.len();
    info!(
        "archiving {} entries with {} workers into '{}'",
        total_entries,
        num_workers,
        opts.output.display()
    );

    let lists = list.partition(num_workers);
    let comm = Comm::new(num_workers);
    let pool: WorkPool<ChunkWorkItem> = WorkPool::new(num_workers);
    let header_opts = HeaderOptions { preserve: opts.preserve };

    let mut results: Vec<Result<u64, ArchiveError>> = Vec::with_capacity(num_workers);
    thread::scope(|s| {
        let mut handles = Vec::with_capacity(num_workers);
        for (rank, list) in lists.iter().enumerate() {
            let comm = comm.handle(rank);
            let pool = pool.clone();
            let writer = &writer;
            handles.push(s.spawn(move || {
                worker_pipeline(list, &comm, &pool, writer, opts.chunk_size, header_opts)
            }));
        }
        for handle in handles {
            results.push(handle.join().unwrap_or_else(|_| {
                Err(ArchiveError::Collective("worker thread panicked".into()))
            }));
        }
    });

    let mut archive_size = 0u64;
    let mut aborted = false;
    for result in results {
        match result {
            Ok(size) => archive_size = size,
            Err(ArchiveError::Aborted) => aborted = true,
            Err(e) => return Err(e),
        }
    }
    if aborted {
        return Err(ArchiveError::Aborted);
    }

    let total = archive_size + TRAILER_LEN;
    let elapsed = started.elapsed();
    println!(
        "[partar] Archive complete | Entries: {} | Size: {:.2} MiB | Workers: {} | Time: {:.2}s",
        total_entries,
        total as f64 / (1024.0 * 1024.0),
        num_workers,
        elapsed.as_secs_f64()
    );

    Ok(CreateSummary { entries: total_entries, archive_size: total })
}

/// One worker's full run. Any failure poisons both shared seams so peers
/// blocked in a collective or on the queue unwind instead of hanging.
fn worker_pipeline(
    list: &FileList,
    comm: &CommHandle,
    pool: &WorkPool<ChunkWorkItem>,
    writer: &SharedWriter,
    chunk_size: u64,
    header_opts: HeaderOptions,
) -> Result<u64, ArchiveError> {
    let result = run_worker(list, comm, pool, writer, chunk_size, header_opts);
    if result.is_err() {
        pool.poison();
        comm.poison();
    }
    result
}

fn run_worker(
    list: &FileList,
    comm: &CommHandle,
    pool: &WorkPool<ChunkWorkItem>,
    writer: &SharedWriter,
    chunk_size: u64,
    header_opts: HeaderOptions,
) -> Result<u64, ArchiveError> {
    let plan = layout::plan(list, comm)?;
    header::write_headers(list, &plan, writer, header_opts)?;

    pool.run(
        |queue| chunk::submit_chunks(list, &plan, chunk_size, queue),
        |_queue, item| chunk::copy_chunk(&item, writer),
    )?;

    // The reduction doubles as the completion barrier: once it returns,
    // every header and chunk in the archive has been written.
    let archive_size = comm.allreduce_sum(plan.local_total)?;
    if comm.rank() == 0 {
        writer.finalize(archive_size)?;
    }
    Ok(archive_size)
}
