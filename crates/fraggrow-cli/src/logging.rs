use crate::error::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
};

/// Console level for the given `-v` count; `-q` silences the console entirely.
pub fn console_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// The log file records at least INFO so that long runs leave a usable trail
/// even when the console is quiet.
pub fn file_level(console: LevelFilter) -> LevelFilter {
    console.max(LevelFilter::INFO)
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let console = console_level(verbosity, quiet);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(console);

    let subscriber = tracing_subscriber::registry().with(stderr_layer);

    if let Some(path) = log_file {
        // Appended, so a restarted run keeps the history of the earlier attempt.
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true)
            .with_filter(file_level(console));

        subscriber.with(file_layer).init();
    } else {
        subscriber.init();
    }

    Ok(())
}
