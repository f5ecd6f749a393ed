//! Error handling for the Tildagon core
//!
//! Provides error types for:
//! - Configuration loading and validation
//! - Event handler faults, as reported by failure containment
//!
//! All error types use `thiserror` for ergonomic error handling.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::app::AppHandle;
use crate::event_bus::HandlerMode;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its valid range
    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// What went wrong inside a handler
#[derive(Error, Debug)]
pub enum FaultCause {
    /// The handler returned an error
    #[error("returned error: {0:#}")]
    Error(anyhow::Error),

    /// The handler panicked
    #[error("panicked: {0}")]
    Panic(String),
}

/// A handler fault attributed to its owning app
#[derive(Error, Debug)]
#[error("{mode} handler '{handler}' of app '{app}' {cause}")]
pub struct HandlerFault {
    /// App that owns the handler.
    pub app: AppHandle,
    /// Handler name.
    pub handler: Arc<str>,
    /// Whether the handler ran in the sync or async phase.
    pub mode: HandlerMode,
    /// The failure itself.
    #[source]
    pub cause: FaultCause,
}

/// Main error type for the Tildagon core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::BasicApp;

    #[test]
    fn test_handler_fault_display() {
        let fault = HandlerFault {
            app: AppHandle::new(BasicApp::new("snake")),
            handler: Arc::from("on_button"),
            mode: HandlerMode::Sync,
            cause: FaultCause::Error(anyhow::anyhow!("index out of range")),
        };
        assert_eq!(
            fault.to_string(),
            "sync handler 'on_button' of app 'snake' returned error: index out of range"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::InvalidValue {
            key: "queue_capacity".into(),
            reason: "must be positive".into(),
        }
        .into();
        assert!(err.is_config_error());
        assert_eq!(
            err.to_string(),
            "Invalid config value for 'queue_capacity': must be positive"
        );
        assert!(!Error::other("x").is_config_error());
    }
}
