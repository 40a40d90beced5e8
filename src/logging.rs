//! Logging Module
//!
//! Structured logging with file output for diagnostics.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging with console and file output
pub fn init() {
    let log_dir = log_directory();
    let _ = std::fs::create_dir_all(&log_dir);

    // Daily rotation keeps a few old console sessions around for support
    let file_appender =
        RollingFileAppender::new(Rotation::DAILY, &log_dir, "statement-console.log");

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_appender);

    // Console output is only useful while developing
    let console_layer = cfg!(debug_assertions).then(|| fmt::layer().with_target(true).pretty());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cfg!(debug_assertions) {
            "debug,hyper=warn,reqwest=warn"
        } else {
            "info,hyper=warn,reqwest=warn"
        })
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("StatementConsole")
        .join("logs")
}
