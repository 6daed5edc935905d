//! Stale-entry reaper configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Stale-entry reaper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Enable the periodic sweep.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Sweep period (seconds).
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    /// How long terminal orders stay in the mirror before pruning (seconds).
    #[serde(default = "default_terminal_retention_secs")]
    pub terminal_retention_secs: u64,
}

impl ReaperConfig {
    /// Sweep period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    /// Retention window for terminal orders in the mirror.
    #[must_use]
    pub const fn terminal_retention(&self) -> Duration {
        Duration::from_secs(self.terminal_retention_secs)
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            period_secs: default_period_secs(),
            terminal_retention_secs: default_terminal_retention_secs(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_period_secs() -> u64 {
    120
}

const fn default_terminal_retention_secs() -> u64 {
    3_600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaper_config_defaults() {
        let config = ReaperConfig::default();
        assert!(config.enabled);
        assert_eq!(config.period(), Duration::from_secs(120));
    }
}
