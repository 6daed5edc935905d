//! Prometheus metrics for the sentinel engine.
//!
//! Counters cover synchronizer decisions, registry sweeps, and feed
//! connectivity. Labels stay low-cardinality: no symbols, no order IDs.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::ObservabilityConfig;

/// Error type for metrics setup.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The configured listen address does not parse.
    #[error("invalid metrics listen address '{0}'")]
    InvalidAddress(String),
    /// Failed to install the metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Initialize the Prometheus metrics exporter.
///
/// Starts an HTTP server exposing metrics at `/metrics`. A no-op when
/// metrics are disabled in configuration.
///
/// # Errors
///
/// Returns an error when the listen address is invalid or the exporter
/// fails to start (e.g. port already in use).
pub fn init_metrics(config: &ObservabilityConfig) -> Result<(), MetricsError> {
    if !config.metrics_enabled {
        tracing::info!("Metrics exporter disabled by configuration");
        return Ok(());
    }

    let addr: SocketAddr = config
        .metrics_listen_addr
        .parse()
        .map_err(|_| MetricsError::InvalidAddress(config.metrics_listen_addr.clone()))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %addr, "Prometheus metrics exporter started");
    Ok(())
}

// ============================================================================
// Synchronizer Metrics
// ============================================================================

/// Record a protective-order creation submitted to the brokerage.
pub fn record_protective_created() {
    counter!("sentinel_protective_orders_created_total").increment(1);
}

/// Record a fill merged into an existing protective order.
pub fn record_protective_merged() {
    counter!("sentinel_protective_orders_merged_total").increment(1);
}

/// Record a protective order confirmed by the event stream.
pub fn record_protective_confirmed() {
    counter!("sentinel_protective_orders_confirmed_total").increment(1);
}

/// Record a buy-fill event that aborted before any brokerage call.
///
/// `reason` is one of `untracked`, `stale`, `position_closed`.
pub fn record_fill_abort(reason: &'static str) {
    counter!("sentinel_fill_aborts_total", "reason" => reason).increment(1);
}

/// Record a brokerage call outcome from the synchronizer.
///
/// `operation` is one of `submit`, `modify`, `cancel`.
pub fn record_broker_call(operation: &'static str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!(
        "sentinel_broker_calls_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a full symbol cleanup (position closure or defensive abort).
pub fn record_symbol_cleanup() {
    counter!("sentinel_symbol_cleanups_total").increment(1);
}

// ============================================================================
// Reaper Metrics
// ============================================================================

/// Record entries removed by the reaper.
///
/// `registry` is `pending` or `protective`.
pub fn record_reaped(registry: &'static str, count: usize) {
    if count > 0 {
        counter!("sentinel_reaped_entries_total", "registry" => registry).increment(count as u64);
    }
}

/// Publish current registry sizes.
#[allow(clippy::cast_precision_loss)]
pub fn record_registry_sizes(pending: usize, protective: usize) {
    gauge!("sentinel_registry_entries", "registry" => "pending").set(pending as f64);
    gauge!("sentinel_registry_entries", "registry" => "protective").set(protective as f64);
}

// ============================================================================
// Feed Metrics
// ============================================================================

/// Record a feed connectivity transition.
///
/// `stream` is `orders` or `positions`.
pub fn record_feed_connected(stream: &'static str, connected: bool) {
    gauge!("sentinel_feed_connected", "stream" => stream).set(if connected { 1.0 } else { 0.0 });
}

/// Record a feed reconnect attempt.
pub fn record_feed_reconnect(stream: &'static str) {
    counter!("sentinel_feed_reconnects_total", "stream" => stream).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_metrics_is_noop() {
        let config = ObservabilityConfig {
            metrics_enabled: false,
            ..Default::default()
        };
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_invalid_address_rejected() {
        let config = ObservabilityConfig {
            metrics_enabled: true,
            metrics_listen_addr: "not-an-address".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(MetricsError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_recorders_do_not_panic_without_exporter() {
        record_protective_created();
        record_protective_merged();
        record_protective_confirmed();
        record_fill_abort("stale");
        record_broker_call("submit", true);
        record_symbol_cleanup();
        record_reaped("pending", 2);
        record_registry_sizes(1, 1);
        record_feed_connected("orders", true);
        record_feed_reconnect("orders");
    }
}
