//! Structured JSONL logging and human-readable stderr output.
//!
//! - **JSONL to file** (~/.chat-stream/logs/chat-stream.jsonl)
//! - **Compact to stderr**
//!
//! ```rust,ignore
//! use chat_stream::logging;
//!
//! // Keep the guard alive for the duration of the program
//! let _guard = logging::init();
//! tracing::info!(event_type = "app_start", "Started");
//! ```
//!
//! Each file line is one JSON object:
//! ```json
//! {"timestamp":"2026-01-05T10:30:45.123Z","level":"INFO","target":"chat_stream::chat::session","fields":{"message":"Exchange settled","outcome":"Completed"}}
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::defaults::APP_DIR_NAME;

const LOG_FILE_NAME: &str = "chat-stream.jsonl";
const DEFAULT_FILTER: &str = "info,rusqlite=warn";

/// Guard that must be kept alive for the duration of the program.
/// Dropping it flushes and closes the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    log_path: PathBuf,
}

impl LoggingGuard {
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

/// Initialize logging into the default log directory
pub fn init() -> LoggingGuard {
    init_with_dir(&log_dir())
}

/// Initialize logging with the JSONL file placed in `dir`.
///
/// A global subscriber can only be installed once; later calls still return
/// a guard but leave the first subscriber in place.
pub fn init_with_dir(dir: &Path) -> LoggingGuard {
    if let Err(e) = fs::create_dir_all(dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }
    let log_path = dir.join(LOG_FILE_NAME);

    let writer: Box<dyn Write + Send> = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => Box::new(file),
        Err(e) => {
            eprintln!("[LOGGING] Failed to open log file: {}", e);
            Box::new(io::sink())
        }
    };
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(writer);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .compact();

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(stderr_layer)
        .try_init();

    match installed {
        Ok(()) => tracing::info!(
            event_type = "app_lifecycle",
            action = "started",
            log_path = %log_path.display(),
            "Logging initialized"
        ),
        Err(e) => tracing::debug!(error = %e, "Logging already initialized"),
    }

    LoggingGuard {
        _file_guard: file_guard,
        log_path,
    }
}

/// Log directory (~/.chat-stream/logs/)
pub fn log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(APP_DIR_NAME).join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("chat-stream-logs"))
}

/// Path to the JSONL log file
pub fn log_path() -> PathBuf {
    log_dir().join(LOG_FILE_NAME)
}

/// Log a timed operation, at warn level once it exceeds `threshold_ms`
pub fn log_perf(operation: &str, duration_ms: u64, threshold_ms: u64) {
    if duration_ms > threshold_ms {
        tracing::warn!(
            event_type = "performance",
            operation = operation,
            duration_ms = duration_ms,
            threshold_ms = threshold_ms,
            is_slow = true,
            "Slow operation: {} took {}ms (threshold: {}ms)",
            operation,
            duration_ms,
            threshold_ms
        );
    } else {
        tracing::debug!(
            event_type = "performance",
            operation = operation,
            duration_ms = duration_ms,
            is_slow = false,
            "Operation {} completed in {}ms",
            operation,
            duration_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_under_app_dir() {
        let path = log_path();
        assert!(path.ends_with(Path::new(LOG_FILE_NAME)));
        assert!(path
            .components()
            .any(|c| c.as_os_str() == APP_DIR_NAME || c.as_os_str() == "chat-stream-logs"));
    }

    #[test]
    fn test_init_creates_log_file_and_tolerates_reinit() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");

        let first = init_with_dir(&logs);
        assert!(first.log_path().exists());

        let second = init_with_dir(&logs);
        assert_eq!(first.log_path(), second.log_path());
    }
}
