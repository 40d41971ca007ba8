use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for all operations in the `partar` crate.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// An I/O error tied to a source path (open, stat, readlink).
    #[error("I/O error on path '{path}': {source}")]
    Io { source: io::Error, path: PathBuf },

    /// A positioned read or write failed while moving one record or chunk;
    /// carries the offending entry path and the absolute archive offset.
    #[error("I/O error copying '{path}' at archive offset {offset}: {source}")]
    Copy {
        source: io::Error,
        path: PathBuf,
        offset: u64,
    },

    /// The source-tree walk failed.
    #[error("error walking source tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// The pax records for one entry do not fit the fixed header block.
    #[error("record header for '{path}' does not fit: {needed} bytes of pax records (max {max})")]
    HeaderOverflow {
        path: String,
        needed: usize,
        max: usize,
    },

    /// A peer worker failed and the whole job was torn down.
    #[error("job aborted: a peer worker failed")]
    Aborted,

    /// A collective operation could not complete.
    #[error("collective operation failed: {0}")]
    Collective(String),

    /// An invalid command-line value that clap itself cannot reject.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A requested mode this build does not carry.
    #[error("{0} is not implemented")]
    Unsupported(&'static str),
}
