//! Log setup for the `dbmsdb-mock` binary

use anyhow::{Context, Result};
use dbmsdb_mock::MockConfig;
use rolling_file::{RollingConditionBasic, RollingFileAppender};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_FILE: &str = "dbmsdb-mock.log";
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
const KEPT_LOG_FILES: usize = 9;

/// `RUST_LOG` wins over the configured directives
fn log_filter(config: &MockConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
}

/// Request spans go to the log file as JSON lines, events also to stderr.
///
/// Dropping the returned guard flushes the file writer.
pub fn init_telemetry(config: &MockConfig) -> Result<WorkerGuard> {
    let log_dir = Path::new(&config.log_dir);
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let appender = RollingFileAppender::new(
        log_dir.join(LOG_FILE),
        RollingConditionBasic::new().daily().max_size(MAX_LOG_BYTES),
        KEPT_LOG_FILES,
    )
    .with_context(|| format!("opening {} in {}", LOG_FILE, log_dir.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_span_events(FmtSpan::CLOSE);
    let console_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(log_filter(config))
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    tracing::info!(log_dir = %log_dir.display(), "Telemetry ready");
    Ok(guard)
}
