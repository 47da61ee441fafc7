//! Structured logging with tracing
//!
//! The compiler only emits `tracing` events. Hosts embedding it may install their own
//! subscriber instead of calling [init_logging].

use graft_config::LoggingConfig;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable overriding the configured filter
pub const LOG_ENV: &str = "GRAFT_LOG";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log level '{0}', use trace, debug, info, warn or error")]
    InvalidLevel(String),
    #[error("Logging could not be initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs a global fmt subscriber, text or JSON
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let level = parse_log_level(&config.level)?;
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    // Layer types differ, so each format gets its own branch
    if config.json_format {
        let layer = fmt::layer().json().with_target(true);
        Registry::default().with(filter).with(layer).try_init()?;
    } else {
        let layer = fmt::layer().with_target(true);
        Registry::default().with(filter).with(layer).try_init()?;
    }

    tracing::debug!("Logging initialized with level: {level}");
    Ok(())
}

pub fn parse_log_level(level: &str) -> Result<Level, LoggingError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}
