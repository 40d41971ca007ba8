use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// Command-line surface of the `partar` binary.
///
/// Exactly one of create or extract must be selected; clap rejects a missing
/// or conflicting mode at parse time with a non-zero exit.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["create", "extract"])))]
pub struct Args {
    /// Create an archive from the given source paths.
    #[arg(short, long)]
    pub create: bool,

    /// Extract an archive.
    #[arg(short = 'x', long)]
    pub extract: bool,

    /// Verbose output (per-header and per-chunk logging).
    #[arg(short, long)]
    pub verbose: bool,

    /// Preserve owner, permissions and extended attributes in headers.
    #[arg(short, long)]
    pub preserve: bool,

    /// Chunk size in MiB for the parallel copy phase.
    #[arg(short = 's', long = "chunksize", default_value_t = 1)]
    pub chunksize: u64,

    /// Target output file.
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Number of worker threads. [0 = one per CPU core]
    #[arg(short = 'j', long, default_value_t = 0)]
    pub workers: usize,

    /// Source files and directories to archive.
    pub sources: Vec<PathBuf>,
}

/// Parses command-line arguments using `clap`.
pub fn parse() -> Args {
    Args::parse()
}
