//! Run configuration for the host driver and CLI.
//!
//! Stored as JSON. Every field is optional in the file; missing ones take
//! their defaults, and command-line flags override whatever the file says.

use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::cpu::DebugSelect;

/// Default number of clock steps a `run` may take.
pub const DEFAULT_CYCLE_LIMIT: u64 = 10_000;

/// Host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Maximum clock steps for a single run.
    pub cycle_limit: u64,
    /// Byte presented on the INPUT port.
    pub input: u8,
    /// Debug readout selector (0-7).
    pub debug_select: u8,
    /// Emit a trace event for every step.
    pub trace: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            cycle_limit: DEFAULT_CYCLE_LIMIT,
            input: 0,
            debug_select: DebugSelect::Output as u8,
            trace: false,
        }
    }
}

impl HostConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json(&text)
    }

    /// The configured debug selector.
    pub fn debug_select(&self) -> DebugSelect {
        DebugSelect::from_bits(self.debug_select)
    }
}

/// Errors that can occur while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let cfg = HostConfig::from_json(r#"{ "input": 15 }"#).unwrap();
        assert_eq!(cfg.input, 15);
        assert_eq!(cfg.cycle_limit, DEFAULT_CYCLE_LIMIT);
        assert_eq!(cfg.debug_select(), DebugSelect::Output);
        assert!(!cfg.trace);
    }

    #[test]
    fn test_full_config() {
        let cfg = HostConfig::from_json(
            r#"{ "cycle_limit": 500, "input": 1, "debug_select": 7, "trace": true }"#,
        )
        .unwrap();
        assert_eq!(cfg.cycle_limit, 500);
        assert_eq!(cfg.debug_select(), DebugSelect::State);
        assert!(cfg.trace);
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(
            HostConfig::from_json(r#"{ "input": 300 }"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(HostConfig::from_json("not json").is_err());
    }
}
