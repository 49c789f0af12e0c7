//! Diagnostics output.
//!
//! The dry-run binary prints macro steps on stdout, so diagnostics go to
//! stderr, plus `LoggingConfig::file` when one is set. A `RUST_LOG`
//! directive in the environment refines the configured level.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{EngineError, Result};

/// Parse a configured level name.
pub fn parse_level(level: &str) -> Result<Level> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(EngineError::Validation(format!("unknown log level '{other}'"))),
    }
}

fn filter(level: Level) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.into())
}

/// Open `path` for appending, creating missing parent directories.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber described by `config`.
///
/// Fails on an unknown level, an unwritable log file, or when a
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let level = parse_level(&config.level)?;

    let file_layer = match config.file.as_str() {
        "" => None,
        path => {
            let file = Arc::new(open_log_file(Path::new(path))?);
            Some(fmt::layer().with_writer(file).with_ansi(false))
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .with(filter(level))
        .try_init()
        .map_err(|e| EngineError::Configuration(format!("logging: {e}")))
}

/// Stderr-only fallback; unknown levels fall back to `info`.
pub fn init_console_only(level: &str) {
    let level = parse_level(level).unwrap_or(Level::INFO);

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter(level))
        .try_init();
}
