//! Structured logging for the alignment engine
//!
//! Console and JSON file output through `tracing-subscriber`, plus the spans
//! that tie per-candidate events to one search run.

pub mod config;
pub mod spans;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

pub use config::{LoggingConfig, RotationPolicy};
pub use spans::SearchSpan;

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured levels. The returned guard
/// flushes the file writer when dropped and must be held for the lifetime of
/// the program.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config.directives()))?;

    let mut layers = Vec::new();
    let mut guard = None;

    if config.console_output {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(config.include_file_location)
            .with_file(config.include_file_location)
            .with_writer(std::io::stderr);
        layers.push(console_layer.boxed());
    }

    if let Some(ref log_dir) = config.log_directory {
        std::fs::create_dir_all(log_dir)?;
        let file_appender: RollingFileAppender = match config.rotation {
            RotationPolicy::Hourly => rolling::hourly(log_dir, "refalign.log"),
            RotationPolicy::Daily => rolling::daily(log_dir, "refalign.log"),
            RotationPolicy::Never => rolling::never(log_dir, "refalign.log"),
        };
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json();
        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    tracing::debug!(?config, "logging initialized");
    Ok(guard)
}

/// Identifier attached to every event of one candidate search.
pub fn new_run_id() -> Uuid {
    Uuid::new_v4()
}
