//! Bridge configuration

use crate::namespace::Kind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for one bridge. Every field has a default, so a config file
/// only needs the keys it changes.
///
/// ```json
/// { "precedence": ["class", "func"], "log_level": "debug" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Namespace path separator of the foreign runtime
    pub separator: String,
    /// Lookup order for names that exist under several kinds
    pub precedence: Vec<Kind>,
    /// Seed new proxies' property caches with declared defaults.
    ///
    /// Saves a round trip per property read, at the cost of reporting a
    /// default that a constructor already overwrote until the next
    /// foreign call invalidates the cache.
    pub prefetch_defaults: bool,
    /// Fallback filter when `FERRY_LOG` is unset
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            separator: "\\".to_string(),
            precedence: vec![Kind::Function, Kind::Class, Kind::Constant, Kind::Global],
            prefetch_defaults: false,
            log_level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.separator.is_empty() {
            return Err(ConfigError::Invalid("separator must not be empty".to_string()));
        }
        if self.precedence.is_empty() {
            return Err(ConfigError::Invalid("precedence must name at least one kind".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = BridgeConfig::from_json(r#"{"prefetch_defaults": true}"#).expect("parse");
        assert!(config.prefetch_defaults);
        assert_eq!(config.separator, "\\");
        assert_eq!(config.precedence[0], Kind::Function);
    }

    #[test]
    fn precedence_uses_wire_kind_names() {
        let config = BridgeConfig::from_json(r#"{"precedence": ["const", "func"]}"#).expect("parse");
        assert_eq!(config.precedence, vec![Kind::Constant, Kind::Function]);
    }

    #[test]
    fn empty_precedence_is_rejected() {
        assert!(matches!(
            BridgeConfig::from_json(r#"{"precedence": []}"#),
            Err(ConfigError::Invalid(_))
        ));
    }
}
