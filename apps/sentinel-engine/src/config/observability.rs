//! Observability configuration.

use serde::{Deserialize, Serialize};

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Expose Prometheus metrics over HTTP.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Bind address for the metrics HTTP listener.
    #[serde(default = "default_metrics_listen_addr")]
    pub metrics_listen_addr: String,
    /// Default log filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
            metrics_listen_addr: default_metrics_listen_addr(),
            log_filter: default_log_filter(),
        }
    }
}

const fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen_addr() -> String {
    "0.0.0.0:9464".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observability_config_defaults() {
        let config = ObservabilityConfig::default();
        assert!(config.metrics_enabled);
        assert_eq!(config.metrics_listen_addr, "0.0.0.0:9464");
        assert_eq!(config.log_filter, "info");
    }
}
