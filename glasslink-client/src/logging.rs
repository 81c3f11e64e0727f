//! Console and file logging.
//!
//! Every event goes to stderr and is appended to a log file at the same
//! level. The file is written from a background worker; keep the returned
//! guard alive until exit so buffered lines are flushed.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

use crate::config::ensure_parent_dir;

/// Open `path` for appending through a non-blocking writer.
pub fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    ensure_parent_dir(path)?;
    let file_name = path
        .file_name()
        .with_context(|| format!("log path has no file name: {}", path.display()))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn file_layer<S>(writer: NonBlocking, level: Level) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(LevelFilter::from_level(level))
}

/// Install the global subscriber: DEBUG with `verbose`, INFO otherwise.
pub fn init_logging(verbose: bool, log_file: &Path) -> Result<WorkerGuard> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let (writer, guard) = file_writer(log_file)?;

    let console = fmt::layer()
        .with_target(false)
        .with_filter(LevelFilter::from_level(level));

    Registry::default()
        .with(console)
        .with(file_layer(writer, level))
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}
