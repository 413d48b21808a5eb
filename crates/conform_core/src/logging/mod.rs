//! Logging infrastructure.
//!
//! This module provides:
//! - Global `tracing` subscriber setup for the service binary, optionally
//!   teeing into a daily rolling file
//! - Per-job loggers that tag lines with the job name
//! - Compact mode with progress filtering
//! - Tail buffer of engine output for error diagnosis
//!
//! # Example
//!
//! ```no_run
//! use conform_core::logging::{JobLoggerBuilder, LogLevel};
//!
//! let logger = JobLoggerBuilder::new("job_42")
//!     .level(LogLevel::Debug)
//!     .build()
//!     .unwrap();
//!
//! logger.phase("Stretch");
//! logger.command("ffmpeg -i in.wav ...");
//! logger.success("Conformed to 9000 ms");
//! ```

mod job_logger;
mod types;

pub use job_logger::{JobLogger, JobLoggerBuilder};
pub use types::{LogConfig, LogLevel, LogSink, MessagePrefix};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix of the daily application log.
pub const APP_LOG_PREFIX: &str = "conform";

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG`, falling back to `default_level`. Output goes to
/// stderr. Calling it more than once is a no-op.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .try_init();
}

/// Initialize the global subscriber with stderr output plus a daily
/// rolling file under `logs_dir`.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process. Falls back to stderr-only output (and
/// returns `None`) if the log file cannot be opened.
pub fn init_tracing_with_file(default_level: LogLevel, logs_dir: &Path) -> Option<WorkerGuard> {
    let appender = match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(APP_LOG_PREFIX)
        .filename_suffix("log")
        .build(logs_dir)
    {
        Ok(appender) => appender,
        Err(e) => {
            init_tracing(default_level);
            tracing::warn!("File logging disabled ({}): {}", logs_dir.display(), e);
            return None;
        }
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter)
        .try_init();

    Some(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
