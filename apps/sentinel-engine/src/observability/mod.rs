//! Logging and metrics setup plus recording helpers.

mod metrics;
mod tracing;

pub use metrics::{
    MetricsError, init_metrics, record_broker_call, record_feed_connected, record_feed_reconnect,
    record_fill_abort, record_protective_confirmed, record_protective_created,
    record_protective_merged, record_reaped, record_registry_sizes, record_symbol_cleanup,
};
pub use tracing::init_tracing;
