//! Structured JSONL logging plus human-readable stderr output.
//!
//! - **JSONL to file** (~/.text-replacer/logs/text-replacer.jsonl) - structured, one event per line
//! - **Compact to stderr** - for developers
//!
//! # Usage
//!
//! ```rust,ignore
//! use text_replacer::logging;
//!
//! // MUST keep the guard alive for the duration of the program
//! let _guard = logging::init();
//!
//! tracing::info!(event_type = "engine_lifecycle", action = "attached", "Engine attached");
//! ```

use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_NAME: &str = "text-replacer.jsonl";

/// Guard that must be kept alive for the duration of the program.
/// Dropping this guard will flush and close the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the dual-output logging system.
///
/// Returns a guard that MUST be kept alive for the duration of the program.
/// If the log file can't be opened, only the stderr layer is installed.
pub fn init() -> LoggingGuard {
    let log_dir = log_dir();
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }
    let log_path = log_dir.join(LOG_FILE_NAME);

    // Default to info, allow override via RUST_LOG
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .compact();

    let (json_layer, file_guard) =
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => {
                // Non-blocking writer so keystroke handling never waits on disk
                let (non_blocking_file, guard) = tracing_appender::non_blocking(file);
                let layer = fmt::layer()
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
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("[LOGGING] Failed to open log file: {}", e);
                (None, None)
            }
        };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init();

    tracing::info!(
        event_type = "app_lifecycle",
        action = "started",
        log_path = %log_path.display(),
        "Logging initialized"
    );

    LoggingGuard {
        _file_guard: file_guard,
    }
}

/// Get the log directory path (~/.text-replacer/logs/)
fn log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".text-replacer").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("text-replacer-logs"))
}

/// Get the path to the JSONL log file
pub fn log_path() -> PathBuf {
    log_dir().join(LOG_FILE_NAME)
}
