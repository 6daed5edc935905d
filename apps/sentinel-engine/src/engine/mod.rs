//! The synchronization engine: state holders, decision logic, and the
//! event router that binds them to the feeds.
//!
//! The order and position streams are the only event sources. The router
//! applies events in delivery order; the one slow path (a buy fill, which
//! may wait on an in-progress creation and round-trip to the brokerage)
//! is dispatched onto its own task so symbols never block each other.
//! Everything a spawned fill handler touches is idempotent, so the
//! at-least-once feed semantics are safe here.

mod cache;
mod locator;
mod pending;
mod reaper;
mod registry;
mod seed;
mod synchronizer;
mod tracker;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::broker::{BrokerAdapter, BrokerError, OrderRequest};
use crate::config::ProtectiveConfig;
use crate::models::{
    OrderSide, OrderStatus, OrderUpdate, PositionUpdate, ResolvedOrderStatus,
};

pub use cache::OrderCache;
pub use locator::{LocatedProtective, StopLimitLocator};
pub use pending::{PendingBuyEntry, PendingBuyRegistry};
pub use reaper::{StaleEntryReaper, SweepOutcome};
pub use registry::{ProtectiveEntry, ProtectiveOrderRegistry, ProtectiveState};
pub use seed::{SeedSummary, seed_state};
pub use synchronizer::{BuyFill, ProtectiveOrderSynchronizer};
pub use tracker::PositionTracker;

/// An event consumed by the engine router.
#[derive(Debug)]
pub enum EngineEvent {
    /// Normalized order update from the order stream.
    Order(OrderUpdate),
    /// Normalized position update from the position stream.
    Position(PositionUpdate),
    /// A feed reconnected; re-seed state from REST snapshots.
    Resync,
}

/// Serializable view of engine registry state for observability.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    /// Tracked pending buys.
    pub pending: Vec<PendingBuyEntry>,
    /// Tracked protective orders.
    pub protective: Vec<ProtectiveEntry>,
    /// Symbols with an in-flight creation/update sequence.
    pub in_progress: Vec<String>,
}

/// The protective-order synchronization engine.
///
/// Owns every state holder and exposes the write path (entry submission),
/// the event entry points, and the observability queries.
pub struct SyncEngine<B> {
    broker: Arc<B>,
    cache: Arc<OrderCache>,
    tracker: Arc<PositionTracker>,
    pending: Arc<PendingBuyRegistry>,
    registry: Arc<ProtectiveOrderRegistry>,
    synchronizer: Arc<ProtectiveOrderSynchronizer<B>>,
}

impl<B: BrokerAdapter + 'static> SyncEngine<B> {
    /// Create an engine over a broker adapter.
    #[must_use]
    pub fn new(broker: Arc<B>, config: ProtectiveConfig) -> Self {
        let cache = Arc::new(OrderCache::new());
        let tracker = Arc::new(PositionTracker::new());
        let pending = Arc::new(PendingBuyRegistry::new(config.pending_staleness()));
        let registry = Arc::new(ProtectiveOrderRegistry::new());
        let synchronizer = Arc::new(ProtectiveOrderSynchronizer::new(
            Arc::clone(&broker),
            Arc::clone(&pending),
            Arc::clone(&registry),
            Arc::clone(&cache),
            Arc::clone(&tracker),
            config,
        ));
        Self {
            broker,
            cache,
            tracker,
            pending,
            registry,
            synchronizer,
        }
    }

    /// Shared order mirror.
    #[must_use]
    pub fn cache(&self) -> Arc<OrderCache> {
        Arc::clone(&self.cache)
    }

    /// Shared position tracker.
    #[must_use]
    pub fn tracker(&self) -> Arc<PositionTracker> {
        Arc::clone(&self.tracker)
    }

    /// Shared pending-buy registry.
    #[must_use]
    pub fn pending(&self) -> Arc<PendingBuyRegistry> {
        Arc::clone(&self.pending)
    }

    /// Shared protective-order registry.
    #[must_use]
    pub fn registry(&self) -> Arc<ProtectiveOrderRegistry> {
        Arc::clone(&self.registry)
    }

    /// Submit a LIMIT BUY entry order and track it for protection.
    ///
    /// # Errors
    ///
    /// Returns the brokerage error when submission fails; nothing is
    /// tracked in that case.
    pub async fn submit_entry(
        &self,
        symbol: &str,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Result<String, BrokerError> {
        let request = OrderRequest::limit_buy(symbol, quantity, limit_price);
        let order_id = self.broker.submit_order(&request).await?;
        self.pending.track(&order_id, symbol, quantity, limit_price);
        tracing::info!(
            symbol = %symbol,
            order_id = %order_id,
            quantity = %quantity,
            limit_price = %limit_price,
            "Entry order submitted and tracked"
        );
        Ok(order_id)
    }

    /// Apply one order update in delivery order.
    ///
    /// Mirrors the order, runs registry bookkeeping, then handles a
    /// tracked buy fill to completion.
    pub async fn handle_order_update(&self, update: OrderUpdate) {
        if !self.cache.upsert(update.order.clone()) {
            tracing::debug!(
                order_id = %update.order.order_id,
                "Dropping order update older than mirrored state"
            );
            return;
        }

        self.synchronizer.on_order_event(&update);

        if let Some(fill) = self.tracked_buy_fill(&update) {
            self.synchronizer.on_buy_fill(fill).await;
        }
    }

    /// Apply one position update; drives closure cleanup.
    pub async fn handle_position_update(&self, update: PositionUpdate) {
        let closed = self.tracker.apply(&update);
        if closed {
            self.synchronizer.on_position_closed(&update.symbol).await;
        }
    }

    /// Extract a buy fill worth processing from an update.
    fn tracked_buy_fill(&self, update: &OrderUpdate) -> Option<BuyFill> {
        let order = &update.order;
        if order.side != OrderSide::Buy || order.status != OrderStatus::Filled {
            return None;
        }
        if !self.pending.contains(&order.order_id) {
            return None;
        }

        let quantity = update.fill_quantity.unwrap_or(order.filled_quantity);
        let price = update
            .fill_price
            .or(order.limit_price)
            .unwrap_or(Decimal::ZERO);
        if quantity <= Decimal::ZERO || price <= Decimal::ZERO {
            tracing::warn!(
                order_id = %order.order_id,
                symbol = %order.symbol,
                "Buy fill with unusable quantity or price, ignoring"
            );
            return None;
        }

        Some(BuyFill {
            order_id: order.order_id.clone(),
            symbol: order.symbol.clone(),
            quantity,
            price,
            timestamp: update.timestamp,
        })
    }

    /// Re-seed mirrors and registry from REST snapshots.
    ///
    /// # Errors
    ///
    /// Returns the brokerage error when a snapshot call fails.
    pub async fn seed(&self) -> Result<SeedSummary, BrokerError> {
        seed_state(
            self.broker.as_ref(),
            &self.cache,
            &self.registry,
            &self.tracker,
        )
        .await
    }

    /// Resolved status for a single order.
    ///
    /// `Pending` while tracked locally and not yet terminal; otherwise
    /// the brokerage-reported terminal status. `None` for orders the
    /// engine has never seen.
    #[must_use]
    pub fn order_status(&self, order_id: &str) -> Option<ResolvedOrderStatus> {
        if let Some(order) = self.cache.get(order_id) {
            if order.status.is_terminal() {
                return Some(ResolvedOrderStatus::Terminal(order.status));
            }
            return Some(ResolvedOrderStatus::Pending);
        }
        if self.pending.contains(order_id) || self.registry.find_by_order(order_id).is_some() {
            return Some(ResolvedOrderStatus::Pending);
        }
        None
    }

    /// Current registry state for observability and debugging.
    #[must_use]
    pub fn registry_snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            pending: self.pending.snapshot(),
            protective: self.registry.snapshot(),
            in_progress: self.registry.in_progress_symbols(),
        }
    }

    /// Run the event router until the channel closes or cancellation.
    ///
    /// Order updates that carry a tracked buy fill are dispatched onto
    /// their own task so a slow creation on one symbol never stalls
    /// events for another; everything else is applied inline, preserving
    /// per-order delivery order.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<EngineEvent>, cancel: CancellationToken) {
        tracing::info!("Engine event router started");
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Event channel closed, router stopping");
                        return;
                    };
                    Self::dispatch(&self, event).await;
                }
                () = cancel.cancelled() => {
                    tracing::info!("Engine event router stopping");
                    return;
                }
            }
        }
    }

    async fn dispatch(engine: &Arc<Self>, event: EngineEvent) {
        match event {
            EngineEvent::Order(update) => {
                let is_slow_path = engine.tracked_buy_fill(&update).is_some();
                if is_slow_path {
                    let engine = Arc::clone(engine);
                    tokio::spawn(async move {
                        engine.handle_order_update(update).await;
                    });
                } else {
                    engine.handle_order_update(update).await;
                }
            }
            EngineEvent::Position(update) => {
                engine.handle_position_update(update).await;
            }
            EngineEvent::Resync => {
                if let Err(error) = engine.seed().await {
                    tracing::error!(error = %error, "Re-seeding after reconnect failed");
                }
            }
        }
    }
}
