use std::path::Path;

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "etl.log";
const DEFAULT_DIRECTIVE: &str = "event_etl=info";

/// Initializes the logging system with console output and, when the log
/// directory is usable, a JSON file output.
///
/// The returned guard flushes the file writer when dropped, so the caller
/// keeps it alive until the process exits. `None` means only the console
/// receives logs.
pub fn init_logging() -> Option<WorkerGuard> {
    let appender = file_appender(Path::new(LOG_DIR));
    let file_enabled = appender.is_some();

    // Non-blocking JSON layer for file logging
    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    // Formatted layer for console logging
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(console_layer)
        .init();

    if !file_enabled {
        warn!("Log directory {} is not writable, logging to console only", LOG_DIR);
    }
    guard
}

/// Daily-rotated appender under `dir`, or `None` when the directory cannot be created
fn file_appender(dir: &Path) -> Option<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE)
        .build(dir)
        .ok()
}

/// `RUST_LOG` when it is set and valid, otherwise `event_etl=info`
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
