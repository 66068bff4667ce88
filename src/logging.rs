//! Tracing subscriber setup
//!
//! Logs go to stderr and, when a log file is configured, are appended to
//! it without ANSI colors. `RUST_LOG` applies at default verbosity.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Errors for logging setup
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize tracing subscriber: {0}")]
    Init(String),
}

/// Filter for the `-v` count and `-q` flag.
pub fn filter_for(verbose: u8, quiet: bool) -> EnvFilter {
    if quiet {
        return EnvFilter::new("warn");
    }
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber.
///
/// An unusable log file is reported and logging continues on stderr.
pub fn init_tracing(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let (file, file_error) = match log_file.map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    let file_layer = file.map(|f| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(f))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .with(filter_for(verbose, quiet))
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    if let (Some(path), Some(e)) = (log_file, file_error) {
        warn!(path = %path.display(), error = %e, "log file unavailable, logging to stderr only");
    }

    Ok(())
}
