//! Sentinel Engine Binary
//!
//! Starts the protective-order synchronization engine.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sentinel-engine [config-path]
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `ALPACA_KEY`: Brokerage API key
//! - `ALPACA_SECRET`: Brokerage API secret
//!
//! ## Optional
//! - `SENTINEL_CONFIG`: Config file path (default: sentinel.yaml)
//! - `RUST_LOG`: Log filter (default: from config, normally info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sentinel_engine::broker::{AlpacaTradingApi, BrokerAdapter};
use sentinel_engine::config::{Config, load_config};
use sentinel_engine::engine::{EngineEvent, StaleEntryReaper, SyncEngine};
use sentinel_engine::feed::FeedStream;
use sentinel_engine::observability::{init_metrics, init_tracing};

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Event channel capacity between the feeds and the router.
const EVENT_CHANNEL_CAPACITY: usize = 10_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS operations
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let _ = dotenvy::dotenv();

    let config = load_configuration()?;
    init_tracing(&config.observability.log_filter);
    init_metrics(&config.observability).context("Failed to start metrics exporter")?;

    tracing::info!("Starting Sentinel protective-order engine");

    if !config.broker.has_credentials() {
        anyhow::bail!("Missing brokerage credentials: set ALPACA_KEY and ALPACA_SECRET");
    }

    let broker =
        Arc::new(AlpacaTradingApi::new(&config.broker).context("Failed to build broker adapter")?);
    broker
        .health_check()
        .await
        .context("Brokerage health check failed")?;
    tracing::info!(broker = broker.broker_name(), "Brokerage connection healthy");

    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&broker),
        config.protective.clone(),
    ));
    let summary = engine
        .seed()
        .await
        .context("Initial state seeding failed")?;
    tracing::info!(
        orders = summary.orders,
        protective_adopted = summary.protective_adopted,
        positions = summary.positions,
        "Initial state seeded"
    );

    let shutdown = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(EVENT_CHANNEL_CAPACITY);

    let router: JoinHandle<()> = tokio::spawn(Arc::clone(&engine).run(event_rx, shutdown.clone()));

    let order_feed = FeedStream::orders(
        &config.feeds,
        &config.broker,
        event_tx.clone(),
        shutdown.clone(),
    );
    let position_feed = FeedStream::positions(
        &config.feeds,
        &config.broker,
        event_tx.clone(),
        shutdown.clone(),
    );
    drop(event_tx);

    let order_feed_task = tokio::spawn(order_feed.run());
    let position_feed_task = tokio::spawn(position_feed.run());

    let reaper = StaleEntryReaper::new(
        engine.pending(),
        engine.registry(),
        engine.cache(),
        config.reaper.clone(),
    );
    let reaper_task = tokio::spawn(reaper.run(shutdown.clone()));

    tracing::info!("Sentinel engine ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    shutdown.cancel();

    let drain = async {
        for (name, task) in [
            ("order feed", order_feed_task),
            ("position feed", position_feed_task),
        ] {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => tracing::warn!(task = name, error = %error, "Task ended with error"),
                Err(error) => tracing::warn!(task = name, error = %error, "Task panicked"),
            }
        }
        let _ = reaper_task.await;
        let _ = router.await;
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("Shutdown timed out, exiting anyway");
    }

    tracing::info!("Sentinel engine stopped");
    Ok(())
}

/// Resolve the config path from argv or environment, then load.
fn load_configuration() -> anyhow::Result<Config> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SENTINEL_CONFIG").ok());
    load_config(path.as_deref()).context("Failed to load configuration")
}
