//! Process-wide logging setup.
//!
//! Library code logs through the `log` facade and opens `tracing` spans.
//! [`init_logging`] routes both into one `tracing-subscriber` registry.

use thiserror::Error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, registry, EnvFilter};

use crate::config::LoggingConfig;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("Logging is already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Builds the filter from `RUST_LOG` when it is set and not blank, else from
/// the configured directive.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    let directive = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => config.filter.clone(),
    };

    EnvFilter::builder()
        .parse(&directive)
        .map_err(|e| TelemetryError::InvalidFilter {
            directive,
            reason: e.to_string(),
        })
}

/// Installs the global subscriber and the `log` bridge. Fails on a second call.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;

    tracing_log::LogTracer::init().map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    let installed = if config.json {
        tracing::subscriber::set_global_default(registry().with(filter).with(fmt::layer().json()))
    } else {
        tracing::subscriber::set_global_default(registry().with(filter).with(fmt::layer()))
    };
    installed.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}
