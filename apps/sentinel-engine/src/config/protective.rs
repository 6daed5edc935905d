//! Protective-order configuration.
//!
//! The price offsets and timing windows here were settled by tuning, not
//! derived from a formula; they are deployment configuration, never
//! hardcoded at call sites.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Protective-order configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectiveConfig {
    /// Offset below the fill price for the stop price (dollars).
    #[serde(default = "default_stop_offset")]
    pub stop_offset: Decimal,
    /// Offset below the stop price for the limit price (dollars).
    #[serde(default = "default_limit_offset")]
    pub limit_offset: Decimal,
    /// Age beyond which a tracked pending buy is presumed superseded (seconds).
    #[serde(default = "default_pending_staleness_secs")]
    pub pending_staleness_secs: u64,
    /// Bounded wait for an in-progress creation on the same symbol (milliseconds).
    #[serde(default = "default_locate_wait_ms")]
    pub locate_wait_ms: u64,
    /// Polling interval while waiting on an in-progress creation (milliseconds).
    #[serde(default = "default_locate_poll_ms")]
    pub locate_poll_ms: u64,
}

impl ProtectiveConfig {
    /// Staleness window for pending buy entries.
    #[must_use]
    pub const fn pending_staleness(&self) -> Duration {
        Duration::from_secs(self.pending_staleness_secs)
    }

    /// Bounded wait for an in-progress creation to resolve.
    #[must_use]
    pub const fn locate_wait(&self) -> Duration {
        Duration::from_millis(self.locate_wait_ms)
    }

    /// Polling interval during the locate wait.
    #[must_use]
    pub const fn locate_poll(&self) -> Duration {
        Duration::from_millis(self.locate_poll_ms)
    }
}

impl Default for ProtectiveConfig {
    fn default() -> Self {
        Self {
            stop_offset: default_stop_offset(),
            limit_offset: default_limit_offset(),
            pending_staleness_secs: default_pending_staleness_secs(),
            locate_wait_ms: default_locate_wait_ms(),
            locate_poll_ms: default_locate_poll_ms(),
        }
    }
}

fn default_stop_offset() -> Decimal {
    // $0.15 below the fill price
    dec!(0.15)
}

fn default_limit_offset() -> Decimal {
    // $0.05 below the stop price
    dec!(0.05)
}

const fn default_pending_staleness_secs() -> u64 {
    300
}

const fn default_locate_wait_ms() -> u64 {
    5_000
}

const fn default_locate_poll_ms() -> u64 {
    250
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protective_config_defaults() {
        let config = ProtectiveConfig::default();
        assert_eq!(config.stop_offset, Decimal::new(15, 2));
        assert_eq!(config.limit_offset, Decimal::new(5, 2));
        assert_eq!(config.pending_staleness(), Duration::from_secs(300));
        assert_eq!(config.locate_wait(), Duration::from_secs(5));
        assert_eq!(config.locate_poll(), Duration::from_millis(250));
    }

    #[test]
    fn test_protective_config_from_yaml() {
        let yaml = "stop_offset: \"0.25\"\nlimit_offset: \"0.10\"\npending_staleness_secs: 120\n";
        let config: ProtectiveConfig = serde_yaml_bw::from_str(yaml).unwrap();
        assert_eq!(config.stop_offset, Decimal::new(25, 2));
        assert_eq!(config.limit_offset, Decimal::new(10, 2));
        assert_eq!(config.pending_staleness_secs, 120);
        // Unspecified fields fall back to defaults
        assert_eq!(config.locate_wait_ms, 5_000);
    }
}
