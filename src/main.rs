//! Main entry point for the partar CLI app

use partar::cli;
use partar::create::{self, CreateOptions};
use partar::ArchiveError;

use log::info;

fn main() -> std::process::ExitCode {
    if let Err(e) = run_app() {
        eprintln!("Error: {}", e);
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

fn run_app() -> Result<(), ArchiveError> {
    let args = cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if args.extract {
        return Err(ArchiveError::Unsupported("extract mode"));
    }

    if args.sources.is_empty() {
        return Err(ArchiveError::InvalidArgument(
            "at least one source path is required".into(),
        ));
    }
    if args.chunksize == 0 {
        return Err(ArchiveError::InvalidArgument(
            "chunk size must be at least 1 MiB".into(),
        ));
    }

    let opts = CreateOptions {
        sources: args.sources,
        output: args.file,
        workers: args.workers,
        chunk_size: args.chunksize * 1024 * 1024,
        preserve: args.preserve,
    };
    info!("chunk size = {}", opts.chunk_size);

    create::create_archive(&opts)?;
    Ok(())
}
