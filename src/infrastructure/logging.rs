//! Centralized file-based logging system
//!
//! Writes logs to files under the configured directory, separated by type:
//! - main/ - every event, JSON
//! - error/ - WARN and ERROR only
//! - control/ - endpoint creation, destruction and control sessions
//! - data/ - session and ring buffer activity

use crate::infrastructure::config::LoggingConfig;
use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_TYPES: [&str; 4] = ["main", "error", "control", "data"];

/// Initialize centralized file logging
///
/// Creates the log directory tree and one rolling appender per log type.
/// The returned guards must be kept alive for the duration of the program.
pub fn init_logging(config: &LoggingConfig) -> io::Result<Vec<WorkerGuard>> {
    create_log_dirs(&config.directory)?;

    let mut guards = Vec::new();
    let mut appender = |name: &str| {
        let (writer, guard) = create_appender(&config.directory.join(name), name);
        guards.push(guard);
        writer
    };

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(appender("main"))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(appender("error"))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let control_layer = tracing_subscriber::fmt::layer()
        .with_writer(appender("control"))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().contains("control")
        }));

    let data_layer = tracing_subscriber::fmt::layer()
        .with_writer(appender("data"))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().contains("data")
                || metadata.target().contains("endpoint")
                || metadata.target().contains("ring_buffer")
        }));

    // Console goes to stderr so stdout stays free for payload
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_level(true);

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(control_layer)
        .with(data_layer)
        .with(console_layer)
        .init();

    tracing::info!(
        directory = %config.directory.display(),
        "Logging system initialized"
    );

    Ok(guards)
}

fn create_log_dirs(root: &Path) -> io::Result<()> {
    for log_type in LOG_TYPES {
        fs::create_dir_all(root.join(log_type))?;
    }
    Ok(())
}

/// Create a rolling file appender
fn create_appender(dir: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);
    tracing_appender::non_blocking(appender)
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_control {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "control", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_data {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "data", $level, $($arg)+)
    };
}
