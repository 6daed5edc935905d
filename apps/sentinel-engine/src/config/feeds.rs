//! Event feed configuration for the brokerage streams.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Event feeds configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// WebSocket URL for the order-update stream.
    #[serde(default = "default_order_stream_url")]
    pub order_stream_url: String,
    /// WebSocket URL for the position-update stream.
    #[serde(default = "default_position_stream_url")]
    pub position_stream_url: String,
    /// Initial reconnect backoff (milliseconds).
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Maximum reconnect backoff (milliseconds).
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Maximum reconnect attempts before giving up; 0 means retry forever.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Idle seconds without any frame before the connection is forced down.
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
}

impl FeedsConfig {
    /// Initial reconnect backoff.
    #[must_use]
    pub const fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Maximum reconnect backoff.
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Idle timeout before a forced reconnect.
    #[must_use]
    pub const fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            order_stream_url: default_order_stream_url(),
            position_stream_url: default_position_stream_url(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
        }
    }
}

fn default_order_stream_url() -> String {
    "wss://paper-api.alpaca.markets/stream".to_string()
}

fn default_position_stream_url() -> String {
    "wss://paper-api.alpaca.markets/stream".to_string()
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_max_reconnect_attempts() -> u32 {
    0
}

const fn default_heartbeat_timeout_secs() -> u64 {
    30
}
