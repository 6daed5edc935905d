//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Initialize console tracing.
///
/// `RUST_LOG` overrides the configured default filter. Safe to call once
/// at startup; subsequent calls are ignored.
pub fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
