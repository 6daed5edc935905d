//! Configuration for the sentinel engine.
//!
//! Loads a YAML file with per-concern sections, each of which falls back
//! to defaults when absent. Credentials are never stored in the file;
//! they resolve from environment variables at load time.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sentinel_engine::config::load_config;
//!
//! // Load from default path (sentinel.yaml) or defaults if absent
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/sentinel.yaml"))?;
//! ```

mod broker;
mod feeds;
mod observability;
mod protective;
mod reaper;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use broker::{API_KEY_ENV, API_SECRET_ENV, BrokerConfig};
pub use feeds::FeedsConfig;
pub use observability::ObservabilityConfig;
pub use protective::ProtectiveConfig;
pub use reaper::ReaperConfig;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "sentinel.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Brokerage trading-API configuration.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Event feed configuration.
    #[serde(default)]
    pub feeds: FeedsConfig,
    /// Protective-order offsets and timing windows.
    #[serde(default)]
    pub protective: ProtectiveConfig,
    /// Stale-entry reaper configuration.
    #[serde(default)]
    pub reaper: ReaperConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` when a window or offset is
    /// non-positive in a way that would disable a timing contract.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protective.stop_offset <= rust_decimal::Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "protective.stop_offset must be positive".to_string(),
            ));
        }
        if self.protective.limit_offset < rust_decimal::Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "protective.limit_offset must not be negative".to_string(),
            ));
        }
        if self.protective.locate_poll_ms == 0 {
            return Err(ConfigError::ValidationError(
                "protective.locate_poll_ms must be positive".to_string(),
            ));
        }
        if self.reaper.enabled && self.reaper.period_secs == 0 {
            return Err(ConfigError::ValidationError(
                "reaper.period_secs must be positive when enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from a YAML file.
///
/// Missing file at the default path is not an error: defaults apply. A
/// missing file at an explicit path is. Credentials resolve from the
/// environment after parsing.
///
/// # Errors
///
/// Returns an error when the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let (path, required) = match path {
        Some(p) => (p, true),
        None => (DEFAULT_CONFIG_PATH, false),
    };

    let mut config = match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml_bw::from_str(&contents)?,
        Err(source) if required => {
            return Err(ConfigError::ReadError {
                path: path.to_string(),
                source,
            });
        }
        Err(_) => {
            tracing::debug!(path = %path, "No config file found, using defaults");
            Config::default()
        }
    };

    config.broker.resolve_credentials();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config_parses() {
        let yaml = r#"
broker:
  base_url: "https://api.alpaca.markets"
  request_timeout_secs: 5
feeds:
  heartbeat_timeout_secs: 15
protective:
  stop_offset: "0.15"
  limit_offset: "0.05"
reaper:
  period_secs: 60
observability:
  metrics_enabled: false
"#;
        let config: Config = serde_yaml_bw::from_str(yaml).unwrap();
        assert_eq!(config.broker.base_url, "https://api.alpaca.markets");
        assert_eq!(config.broker.request_timeout_secs, 5);
        assert_eq!(config.feeds.heartbeat_timeout_secs, 15);
        assert_eq!(config.protective.stop_offset, Decimal::new(15, 2));
        assert_eq!(config.reaper.period_secs, 60);
        assert!(!config.observability.metrics_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_stop_offset_rejected() {
        let config = Config {
            protective: ProtectiveConfig {
                stop_offset: Decimal::ZERO,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let result = load_config(Some("/nonexistent/sentinel.yaml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
