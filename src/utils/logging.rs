//! Logging initialization for Ferrule.
//!
//! Supports three formats:
//! - `pretty`: multi-line human-readable output
//! - `component`: compact single line per event, easy to grep
//! - `json`: structured JSON lines for log aggregators
//!
//! Logs go to stderr (or a file) so they never mix with tool output the
//! operator reads on stdout.

use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{FerruleError, Result};

/// Build the filter: `RUST_LOG` when set, `cfg.level` otherwise.
fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level))
}

/// Initialize the global tracing subscriber from config.
///
/// Call once at startup before any tracing events are emitted.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = build_filter(cfg);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match (&cfg.file, cfg.format) {
        (Some(path), format) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let builder = builder.with_writer(Mutex::new(file)).with_ansi(false);
            match format {
                LogFormat::Json => builder.json().try_init(),
                LogFormat::Pretty => builder.pretty().try_init(),
                LogFormat::Component => builder.with_target(true).compact().try_init(),
            }
        }
        (None, LogFormat::Json) => builder.with_writer(std::io::stderr).json().try_init(),
        (None, LogFormat::Pretty) => builder.with_writer(std::io::stderr).pretty().try_init(),
        (None, LogFormat::Component) => builder
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
            .try_init(),
    };

    installed.map_err(|e| FerruleError::Config(format!("Failed to initialize logging: {}", e)))
}
