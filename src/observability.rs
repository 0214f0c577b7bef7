// SPDX-License-Identifier: Apache-2.0

//! Logging and observability helpers.

pub mod sensitive;

pub use sensitive::Sensitive;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

pub const LOG_FILE_PREFIX: &str = "datagate.log";

pub fn init_tracing(config: &LoggingConfig) {
    let log_dir = config.directory.clone().unwrap_or_else(log_directory);
    let _ = fs::create_dir_all(&log_dir);

    // 1. Clean up old logs
    match cleanup_old_logs(&log_dir, config.retention_days) {
        Ok(removed) if removed > 0 => {
            eprintln!("Removed {} old log file(s) from {:?}", removed, log_dir)
        }
        Ok(_) => {}
        Err(e) => eprintln!("Failed to clean up old logs: {}", e),
    }

    // 2. Setup file appender
    let file_appender: RollingFileAppender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    // 3. Setup subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(file_appender)
        .json()
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();

    // 4. Register panic hook
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info.payload();
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("PANIC: {}", s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("PANIC: {}", s)
        } else {
            "PANIC: unknown cause".to_string()
        };

        tracing::error!(target: "panic", location = %location, message = %msg, "Process panicked");
        previous_hook(panic_info);
    }));

    tracing::info!("Tracing initialized. Logs directory: {:?}", log_dir);
}

/// `~/.datagate/logs`, falling back to the working directory without a home
pub fn log_directory() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_default();
    path.push(".datagate");
    path.push("logs");
    path
}

/// Deletes `*.log*` files older than the retention window; returns how many
pub fn cleanup_old_logs(log_dir: &Path, retention_days: u64) -> std::io::Result<usize> {
    let now = SystemTime::now();
    let retention = Duration::from_secs(retention_days * 24 * 60 * 60);
    let mut removed = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(LOG_FILE_PREFIX) || name.ends_with(".log"))
            .unwrap_or(false);
        if !is_log {
            continue;
        }

        let age = fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if matches!(age, Some(age) if age > retention) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!("Failed to remove old log file {:?}: {}", path, e),
            }
        }
    }
    Ok(removed)
}
