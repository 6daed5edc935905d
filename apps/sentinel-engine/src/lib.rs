// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Sentinel Engine - Protective Order Synchronization
//!
//! Keeps a layer of protective STOP_LIMIT sell orders consistent with a
//! brokerage's asynchronously-reported order and position state. When a
//! tracked buy fills, the engine creates or enlarges a protective sell
//! sized to the resulting position, exactly once, while tolerating
//! out-of-order and redelivered events, concurrent fills on the same
//! instrument, and manual sells that invalidate in-flight work.
//!
//! # Architecture
//!
//! - `models`: canonical order/position mirror types and status
//!   normalization
//! - `config`: YAML configuration with per-concern sections
//! - `broker`: the trading-API port, REST adapter, retry policy, and the
//!   test double
//! - `feed`: WebSocket consumers for the order and position streams
//! - `engine`: registries, locator, synchronizer, reaper, and the event
//!   router
//! - `observability`: tracing and Prometheus metrics setup
//!
//! The order and position streams are the only event sources; the
//! synchronizer is the only writer to the registries. Delivery is
//! at-least-once and gappy, so every entry point is idempotent and a
//! periodic reaper removes entries that no longer match live orders.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Brokerage trading-API port and adapters.
pub mod broker;

/// Configuration loading and validation.
pub mod config;

/// The synchronization engine and its state holders.
pub mod engine;

/// Brokerage event-stream consumption.
pub mod feed;

/// Canonical data model.
pub mod models;

/// Logging and metrics.
pub mod observability;

pub use broker::{AlpacaTradingApi, BrokerAdapter, BrokerError, MockBroker, OrderRequest};
pub use config::{Config, ConfigError, load_config};
pub use engine::{
    BuyFill, EngineEvent, LocatedProtective, OrderCache, PendingBuyEntry, PendingBuyRegistry,
    PositionTracker, ProtectiveEntry, ProtectiveOrderRegistry, ProtectiveOrderSynchronizer,
    ProtectiveState, RegistrySnapshot, StaleEntryReaper, StopLimitLocator, SyncEngine,
};
pub use feed::{FeedError, FeedStream};
pub use models::{
    OrderSide, OrderSnapshot, OrderStatus, OrderType, OrderUpdate, PositionSnapshot,
    PositionUpdate, ResolvedOrderStatus, TimeInForce,
};
