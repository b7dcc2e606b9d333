//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and to a file. When `PDFCHAT_LOG_FILE` is set,
//! logs are appended to that path; otherwise a daily-rolling `logs/pdfchat.log` is kept with the
//! five most recent files retained. Both file paths use a non‑blocking writer.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_DIR: &str = "logs";
const LOG_PREFIX: &str = "pdfchat";
const LOG_SUFFIX: &str = "log";
const MAX_LOG_FILES: usize = 5;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Falls back to stdout only when the log file cannot be opened.
/// - Keeps the non‑blocking writer guard alive for the process lifetime.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

fn configure_file_writer() -> Option<NonBlocking> {
    if let Ok(path) = std::env::var("PDFCHAT_LOG_FILE") {
        return match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            Ok(file) => Some(install_writer(tracing_appender::non_blocking(file))),
            Err(err) => {
                eprintln!("Failed to open log file {path}: {err}");
                None
            }
        };
    }

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(LOG_DIR);

    match appender {
        Ok(appender) => Some(install_writer(tracing_appender::non_blocking(appender))),
        Err(err) => {
            eprintln!("Failed to create rolling log in {LOG_DIR}: {err}");
            None
        }
    }
}

fn install_writer((writer, guard): (NonBlocking, WorkerGuard)) -> NonBlocking {
    let _ = LOG_GUARD.set(guard);
    writer
}
