//! Structured logging setup shared across the orchestrator binary.
//!
//! Three initializers, picked by the caller based on deployment shape:
//! - [`init_logging`]: human-readable console output for interactive use.
//! - [`init_logging_json`]: JSON lines on stdout, for log aggregation.
//! - [`init_logging_production`]: console output plus a main/error log file
//!   pair, for an unattended run.

use std::path::Path;

use anyhow::Result;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Initialize logging with colorful console output.
///
/// `level` is used as the filter directive only when `RUST_LOG` is unset.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(true)
                .with_target(true)
                .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
                .with_span_events(FmtSpan::CLOSE),
        )
        .init();

    Ok(())
}

/// Initialize logging with JSON output, suitable for log aggregation
/// (Loki, ELK, Datadog and similar).
pub fn init_logging_json(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true),
        )
        .init();

    Ok(())
}

/// Initialize logging with console output plus a pair of append-only log
/// files under `log_dir`: `cyris.log` (everything at `level`) and
/// `cyris.err.log` (errors only, regardless of `level`).
pub fn init_logging_production(level: &str, log_dir: &Path, json_file: bool) -> Result<()> {
    use std::fs::OpenOptions;

    std::fs::create_dir_all(log_dir)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let error_filter = EnvFilter::new("error");

    let console_layer = fmt::layer()
        .with_ansi(true)
        .with_target(true)
        .with_timer(ChronoLocal::new("%H:%M:%S%.3f".to_string()))
        .with_filter(filter.clone());

    let main_log_path = log_dir.join("cyris.log");
    let main_log_file = OpenOptions::new().create(true).append(true).open(&main_log_path)?;

    let file_layer = if json_file {
        fmt::layer()
            .json()
            .with_writer(move || main_log_file.try_clone().unwrap())
            .with_ansi(false)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(move || main_log_file.try_clone().unwrap())
            .with_ansi(false)
            .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
            .with_filter(filter)
            .boxed()
    };

    let error_log_path = log_dir.join("cyris.err.log");
    let error_log_file = OpenOptions::new().create(true).append(true).open(&error_log_path)?;

    let error_layer = fmt::layer()
        .with_writer(move || error_log_file.try_clone().unwrap())
        .with_ansi(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_filter(error_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(error_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_logging_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        assert!(!log_dir.exists());
        std::fs::create_dir_all(&log_dir).unwrap();
        assert!(log_dir.exists());
    }
}
