//! Event bus configuration.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! # Bound for publish_async. Omit for an unbounded queue.
//! queue_capacity = 64
//! # Log a warning when a delivery phase takes longer than this.
//! slow_phase_warning_ms = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for the event bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Soft bound on queued events for `publish_async`; `None` is unbounded.
    pub queue_capacity: Option<usize>,
    /// Phase duration, in milliseconds, above which a warning is logged.
    pub slow_phase_warning_ms: u64,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            slow_phase_warning_ms: 100,
        }
    }
}

impl EventBusConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "queue_capacity".to_string(),
                reason: "must be at least 1, or omitted for an unbounded queue".to_string(),
            });
        }
        Ok(())
    }

    /// Slow phase threshold as a `Duration`
    pub fn slow_phase_warning(&self) -> Duration {
        Duration::from_millis(self.slow_phase_warning_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EventBusConfig::from_toml_str("").expect("empty config");
        assert_eq!(config, EventBusConfig::default());
        assert_eq!(config.slow_phase_warning(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_document() {
        let config = EventBusConfig::from_toml_str("queue_capacity = 8").expect("config");
        assert_eq!(config.queue_capacity, Some(8));
        assert_eq!(config.slow_phase_warning_ms, 100);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = EventBusConfig::from_toml_str("queue_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "queue_capacity"));
    }

    #[test]
    fn test_malformed_document_rejected() {
        let err = EventBusConfig::from_toml_str("slow_phase_warning_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "slow_phase_warning_ms = 250").expect("write");

        let config = EventBusConfig::load(file.path()).expect("load");
        assert_eq!(config.slow_phase_warning(), Duration::from_millis(250));
        assert_eq!(config.queue_capacity, None);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = EventBusConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
