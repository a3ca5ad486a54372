//! Logger initialization.
//!
//! Thin wrapper over `tracing-subscriber` selecting a level and an output
//! format (human-readable text or JSON lines). Intended for binaries
//! embedding the runtime; libraries should only emit `tracing` events.

use serde::Deserialize;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Logger initialization errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("incorrect log level: {0} (expected debug, info, warn or error)")]
    IncorrectLevel(String),

    #[error("failed to initialize logger: {0}")]
    Init(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Text,

    /// One JSON object per line
    Json,
}

fn parse_level(level: &str) -> Result<Level, LoggingError> {
    match level {
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(LoggingError::IncorrectLevel(other.to_string())),
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG`, when set, overrides `level` for per-module filtering.
/// Fails if a global subscriber is already installed.
pub fn init(level: &str, format: LogFormat) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let result = match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}
