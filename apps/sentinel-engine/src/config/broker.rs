//! Brokerage trading-API configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable holding the brokerage API key.
pub const API_KEY_ENV: &str = "ALPACA_KEY";

/// Environment variable holding the brokerage API secret.
pub const API_SECRET_ENV: &str = "ALPACA_SECRET";

/// Brokerage trading-API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Base URL for the trading REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key; resolved from `ALPACA_KEY` when empty.
    #[serde(default)]
    pub api_key: String,
    /// API secret; resolved from `ALPACA_SECRET` when empty.
    #[serde(default)]
    pub api_secret: String,
    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum attempts for retryable transport faults.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    /// Initial retry backoff (milliseconds).
    #[serde(default = "default_retry_initial_backoff_ms")]
    pub retry_initial_backoff_ms: u64,
    /// Maximum retry backoff (milliseconds).
    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,
}

impl BrokerConfig {
    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Fill empty credentials from the environment.
    pub fn resolve_credentials(&mut self) {
        if self.api_key.is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                self.api_key = key;
            }
        }
        if self.api_secret.is_empty() {
            if let Ok(secret) = std::env::var(API_SECRET_ENV) {
                self.api_secret = secret;
            }
        }
    }

    /// Returns true when both credentials are present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            api_secret: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_initial_backoff_ms: default_retry_initial_backoff_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
        }
    }
}

fn default_base_url() -> String {
    "https://paper-api.alpaca.markets".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    10
}

const fn default_retry_max_attempts() -> u32 {
    3
}

const fn default_retry_initial_backoff_ms() -> u64 {
    250
}

const fn default_retry_max_backoff_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_config_defaults() {
        let config = BrokerConfig::default();
        assert!(config.base_url.contains("paper"));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_max_attempts, 3);
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_explicit_credentials_not_overwritten() {
        let mut config = BrokerConfig {
            api_key: "inline-key".to_string(),
            api_secret: "inline-secret".to_string(),
            ..Default::default()
        };
        config.resolve_credentials();
        assert_eq!(config.api_key, "inline-key");
        assert_eq!(config.api_secret, "inline-secret");
        assert!(config.has_credentials());
    }
}
