//! Protective-order synchronization.
//!
//! Reacts to buy-fill and position-closed events and drives protective
//! order creation, merging, and cleanup. Per symbol the flow moves
//! through locate, create, and update phases; the registry's in-progress
//! marker is the only exclusion point, and a bounded polling wait (never
//! a blocking lock) resolves concurrent fills on one symbol.
//!
//! Idempotency over ordering: the upstream feed is at-least-once and may
//! interleave orders, so every entry point tolerates redelivery. A
//! redelivered buy fill dies at validation because resolving the pending
//! entry is a take-once operation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::broker::{BrokerAdapter, OrderRequest};
use crate::config::ProtectiveConfig;
use crate::models::{OrderSide, OrderStatus, OrderUpdate};
use crate::observability::{
    record_broker_call, record_fill_abort, record_protective_confirmed,
    record_protective_created, record_protective_merged, record_symbol_cleanup,
};

use super::cache::OrderCache;
use super::locator::{LocatedProtective, StopLimitLocator};
use super::pending::PendingBuyRegistry;
use super::registry::{ProtectiveOrderRegistry, ProtectiveState};
use super::tracker::PositionTracker;

/// A buy-fill event extracted from the order stream.
#[derive(Debug, Clone)]
pub struct BuyFill {
    /// Brokerage order ID of the filled buy.
    pub order_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Filled quantity.
    pub quantity: Decimal,
    /// Fill price.
    pub price: Decimal,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Decision engine keeping protective orders consistent with fills and
/// position state.
pub struct ProtectiveOrderSynchronizer<B> {
    broker: Arc<B>,
    pending: Arc<PendingBuyRegistry>,
    registry: Arc<ProtectiveOrderRegistry>,
    cache: Arc<OrderCache>,
    tracker: Arc<PositionTracker>,
    locator: StopLimitLocator,
    config: ProtectiveConfig,
}

impl<B: BrokerAdapter> ProtectiveOrderSynchronizer<B> {
    /// Create a synchronizer over shared engine state.
    #[must_use]
    pub fn new(
        broker: Arc<B>,
        pending: Arc<PendingBuyRegistry>,
        registry: Arc<ProtectiveOrderRegistry>,
        cache: Arc<OrderCache>,
        tracker: Arc<PositionTracker>,
        config: ProtectiveConfig,
    ) -> Self {
        let locator = StopLimitLocator::new(Arc::clone(&registry), Arc::clone(&cache));
        Self {
            broker,
            pending,
            registry,
            cache,
            tracker,
            locator,
            config,
        }
    }

    /// Handle a buy-fill event.
    ///
    /// Validates the fill against the pending registry and position
    /// state, then locates an existing protective order to merge into or
    /// creates a new one.
    pub async fn on_buy_fill(&self, fill: BuyFill) {
        // Validate: take-once resolution makes redelivery a no-op.
        let Some(entry) = self.pending.resolve(&fill.order_id) else {
            tracing::debug!(
                order_id = %fill.order_id,
                symbol = %fill.symbol,
                "Buy fill for untracked order, ignoring"
            );
            record_fill_abort("untracked");
            return;
        };

        let now = Utc::now();
        if self.pending.is_stale(&entry, now) {
            tracing::warn!(
                order_id = %fill.order_id,
                symbol = %fill.symbol,
                age_secs = entry.age(now).as_secs(),
                "Tracked buy aged out, presumed superseded; no protective order"
            );
            record_fill_abort("stale");
            return;
        }

        // Position check: a manual sell may have raced ahead of this event.
        if self.tracker.get(&fill.symbol) <= Decimal::ZERO {
            tracing::warn!(
                order_id = %fill.order_id,
                symbol = %fill.symbol,
                "Position already closed, clearing lingering state"
            );
            record_fill_abort("position_closed");
            self.cleanup_symbol(&fill.symbol);
            return;
        }

        self.locate_or_create(&fill).await;
    }

    /// Locate an existing protective order and merge, or create a new one.
    async fn locate_or_create(&self, fill: &BuyFill) {
        // Serialize: another fill on this symbol may be mid-creation.
        if self.registry.in_progress(&fill.symbol) {
            if let Some(found) = self.await_in_progress(&fill.symbol).await {
                if self.merge_into(&found, fill).await {
                    return;
                }
            }
        }

        if let Some(found) = self.locator.find(&fill.symbol) {
            if self.merge_into(&found, fill).await {
                return;
            }
            tracing::warn!(
                symbol = %fill.symbol,
                order_id = %found.order_id(),
                "Modification refused, falling back to fresh protective order"
            );
        }

        if !self.registry.begin(&fill.symbol) {
            // Lost the creation race after the locate came up empty.
            if let Some(found) = self.await_in_progress(&fill.symbol).await {
                if self.merge_into(&found, fill).await {
                    return;
                }
            }
            // The competing sequence resolved to nothing or is stuck;
            // take our turn rather than dropping the fill uncovered.
            self.registry.begin(&fill.symbol);
        }
        self.create_protective(fill).await;
    }

    /// Bounded wait for an in-progress creation on this symbol to resolve.
    ///
    /// Polls the locator; never holds a lock across the wait. On timeout
    /// the caller proceeds as if no in-progress work existed, which keeps
    /// a stuck creation from deadlocking the symbol.
    async fn await_in_progress(&self, symbol: &str) -> Option<LocatedProtective> {
        let deadline = tokio::time::Instant::now() + self.config.locate_wait();
        loop {
            if let Some(found) = self.locator.find(symbol) {
                return Some(found);
            }
            if !self.registry.in_progress(symbol) {
                tracing::debug!(
                    symbol = %symbol,
                    "In-progress work resolved without a protective order"
                );
                return None;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    symbol = %symbol,
                    wait_ms = self.config.locate_wait_ms,
                    "In-progress protective creation did not resolve in time"
                );
                return None;
            }
            tokio::time::sleep(self.config.locate_poll()).await;
        }
    }

    /// Merge a fill into an existing protective order via modification.
    ///
    /// Returns true on success. On failure the registry is left exactly
    /// as it was; the caller decides whether to fall back to creation.
    async fn merge_into(&self, existing: &LocatedProtective, fill: &BuyFill) -> bool {
        let merged_quantity = existing.quantity() + fill.quantity;
        tracing::info!(
            symbol = %fill.symbol,
            order_id = %existing.order_id(),
            fill_quantity = %fill.quantity,
            merged_quantity = %merged_quantity,
            "Merging fill into existing protective order"
        );

        match self
            .broker
            .modify_order(existing.order_id(), merged_quantity)
            .await
        {
            Ok(()) => {
                record_broker_call("modify", true);
                record_protective_merged();
                // Identity is stable; only the tracked quantity moves.
                self.registry.set_quantity(&fill.symbol, merged_quantity);
                true
            }
            Err(error) => {
                record_broker_call("modify", false);
                tracing::error!(
                    symbol = %fill.symbol,
                    order_id = %existing.order_id(),
                    error = %error,
                    "Protective order modification failed"
                );
                false
            }
        }
    }

    /// Submit a new protective STOP_LIMIT SELL for a fill.
    ///
    /// The in-progress marker must be set on entry; it is released only
    /// after the submission call returns, success or failure.
    async fn create_protective(&self, fill: &BuyFill) {
        self.cancel_competing_sells(&fill.symbol).await;

        let stop_price = fill.price - self.config.stop_offset;
        let limit_price = stop_price - self.config.limit_offset;
        let request =
            OrderRequest::protective_sell(&fill.symbol, fill.quantity, stop_price, limit_price);

        tracing::info!(
            symbol = %fill.symbol,
            quantity = %fill.quantity,
            stop_price = %stop_price,
            limit_price = %limit_price,
            "Submitting protective order"
        );

        match self.broker.submit_order(&request).await {
            Ok(order_id) => {
                record_broker_call("submit", true);
                record_protective_created();
                self.registry
                    .record_awaiting(&fill.symbol, &order_id, fill.quantity);
                tracing::info!(
                    symbol = %fill.symbol,
                    order_id = %order_id,
                    "Protective order awaiting acknowledgment"
                );
            }
            Err(error) => {
                record_broker_call("submit", false);
                // Never record success speculatively: the registry only
                // reflects orders known to exist.
                tracing::error!(
                    symbol = %fill.symbol,
                    error = %error,
                    "Protective order submission failed"
                );
            }
        }

        self.registry.end(&fill.symbol);
    }

    /// Cancel open sell orders that would compete with a new protective order.
    async fn cancel_competing_sells(&self, symbol: &str) {
        let competing: Vec<_> = self
            .cache
            .open_sells(symbol)
            .into_iter()
            .filter(|o| !o.is_protective_sell())
            .collect();

        for order in competing {
            match self.broker.cancel_order(&order.order_id).await {
                Ok(()) => {
                    record_broker_call("cancel", true);
                    tracing::info!(
                        symbol = %symbol,
                        order_id = %order.order_id,
                        "Cancelled competing sell order"
                    );
                }
                Err(error) => {
                    record_broker_call("cancel", false);
                    tracing::warn!(
                        symbol = %symbol,
                        order_id = %order.order_id,
                        error = %error,
                        "Failed to cancel competing sell order"
                    );
                }
            }
        }
    }

    /// Handle a non-fill order event: promotion and removal bookkeeping.
    pub fn on_order_event(&self, update: &OrderUpdate) {
        let order = &update.order;
        match order.status {
            // Working implies acknowledgment even when the ACK itself was
            // never observed.
            OrderStatus::Acknowledged | OrderStatus::Working => {
                if let Some(symbol) = self.registry.confirm(&order.order_id) {
                    record_protective_confirmed();
                    tracing::info!(
                        symbol = %symbol,
                        order_id = %order.order_id,
                        "Protective order confirmed"
                    );
                }
            }
            OrderStatus::Cancelled | OrderStatus::Rejected => {
                if self.pending.resolve(&order.order_id).is_some() {
                    tracing::info!(
                        order_id = %order.order_id,
                        symbol = %order.symbol,
                        status = %order.status,
                        "Tracked buy resolved without a fill"
                    );
                }
                if let Some(entry) = self.registry.remove_order(&order.order_id) {
                    tracing::warn!(
                        symbol = %entry.symbol,
                        order_id = %order.order_id,
                        status = %order.status,
                        "Protective order terminated by brokerage"
                    );
                    self.registry.end(&entry.symbol);
                }
            }
            OrderStatus::Filled => {
                if order.side == OrderSide::Sell {
                    if let Some(entry) = self.registry.remove_order(&order.order_id) {
                        tracing::info!(
                            symbol = %entry.symbol,
                            order_id = %order.order_id,
                            "Protective order filled"
                        );
                    }
                }
            }
            OrderStatus::Submitted => {}
        }
    }

    /// Handle a position-closed signal.
    ///
    /// Supersedes any in-flight work for the symbol: registries are
    /// cleared unconditionally, then a protective order still awaiting
    /// acknowledgment gets a best-effort cancel whose outcome is ignored.
    pub async fn on_position_closed(&self, symbol: &str) {
        let removed_pending = self.pending.cleanup_symbol(symbol);
        let removed_protective = self.registry.cleanup_symbol(symbol);
        record_symbol_cleanup();

        tracing::info!(
            symbol = %symbol,
            removed_pending,
            removed_protective = removed_protective.is_some(),
            "Position closed, registry state cleared"
        );

        if let Some(entry) = removed_protective {
            if entry.state == ProtectiveState::AwaitingAck {
                if let Err(error) = self.broker.cancel_order(&entry.order_id).await {
                    tracing::warn!(
                        symbol = %symbol,
                        order_id = %entry.order_id,
                        error = %error,
                        "Best-effort cancel of unacknowledged protective order failed"
                    );
                }
            }
        }
    }

    /// Clear registry state for a symbol without touching the brokerage.
    ///
    /// The single idempotent cleanup used by every defensive abort path.
    pub fn cleanup_symbol(&self, symbol: &str) {
        self.pending.cleanup_symbol(symbol);
        self.registry.cleanup_symbol(symbol);
        record_symbol_cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{MockBroker, MockBrokerAdapter};
    use crate::models::{OrderSnapshot, OrderType, PositionUpdate};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn fill(order_id: &str, symbol: &str, quantity: Decimal, price: Decimal) -> BuyFill {
        BuyFill {
            order_id: order_id.to_string(),
            symbol: symbol.to_string(),
            quantity,
            price,
            timestamp: Utc::now(),
        }
    }

    struct Harness {
        broker: Arc<MockBroker>,
        pending: Arc<PendingBuyRegistry>,
        registry: Arc<ProtectiveOrderRegistry>,
        cache: Arc<OrderCache>,
        tracker: Arc<PositionTracker>,
        sync: ProtectiveOrderSynchronizer<MockBroker>,
    }

    fn harness_with(config: ProtectiveConfig) -> Harness {
        let broker = Arc::new(MockBroker::new());
        let pending = Arc::new(PendingBuyRegistry::new(config.pending_staleness()));
        let registry = Arc::new(ProtectiveOrderRegistry::new());
        let cache = Arc::new(OrderCache::new());
        let tracker = Arc::new(PositionTracker::new());
        let sync = ProtectiveOrderSynchronizer::new(
            Arc::clone(&broker),
            Arc::clone(&pending),
            Arc::clone(&registry),
            Arc::clone(&cache),
            Arc::clone(&tracker),
            config,
        );
        Harness {
            broker,
            pending,
            registry,
            cache,
            tracker,
            sync,
        }
    }

    fn harness() -> Harness {
        harness_with(ProtectiveConfig {
            locate_wait_ms: 500,
            locate_poll_ms: 10,
            ..Default::default()
        })
    }

    fn open_position(h: &Harness, symbol: &str, quantity: Decimal) {
        h.tracker.apply(&PositionUpdate {
            symbol: symbol.to_string(),
            quantity,
            avg_price: dec!(10.00),
            timestamp: Utc::now(),
        });
    }

    #[tokio::test]
    async fn test_new_position_creates_protective_order() {
        let h = harness();
        open_position(&h, "AAPL", dec!(100));
        h.pending.track("buy-1", "AAPL", dec!(100), dec!(10.00));

        h.sync
            .on_buy_fill(fill("buy-1", "AAPL", dec!(100), dec!(10.00)))
            .await;

        let submitted = h.broker.submitted();
        assert_eq!(submitted.len(), 1);
        let (order_id, request) = &submitted[0];
        assert_eq!(request.symbol, "AAPL");
        assert_eq!(request.quantity, dec!(100));
        assert_eq!(request.stop_price, Some(dec!(9.85)));
        assert_eq!(request.limit_price, Some(dec!(9.80)));

        let entry = h.registry.get("AAPL").unwrap();
        assert_eq!(entry.order_id, *order_id);
        assert_eq!(entry.state, ProtectiveState::AwaitingAck);
        assert!(!h.registry.in_progress("AAPL"));
    }

    #[tokio::test]
    async fn test_untracked_fill_makes_no_broker_call() {
        let broker = Arc::new(MockBrokerAdapter::new());
        let config = ProtectiveConfig::default();
        let sync = ProtectiveOrderSynchronizer::new(
            Arc::clone(&broker),
            Arc::new(PendingBuyRegistry::new(config.pending_staleness())),
            Arc::new(ProtectiveOrderRegistry::new()),
            Arc::new(OrderCache::new()),
            Arc::new(PositionTracker::new()),
            config,
        );

        // No expectations set: any broker call panics the test.
        sync.on_buy_fill(fill("unknown", "AAPL", dec!(100), dec!(10.00)))
            .await;
    }

    #[tokio::test]
    async fn test_stale_entry_aborts_and_removes() {
        let h = harness_with(ProtectiveConfig {
            pending_staleness_secs: 0,
            locate_wait_ms: 100,
            locate_poll_ms: 10,
            ..Default::default()
        });
        open_position(&h, "AAPL", dec!(100));
        h.pending.track("buy-1", "AAPL", dec!(100), dec!(10.00));

        tokio::time::sleep(Duration::from_millis(5)).await;
        h.sync
            .on_buy_fill(fill("buy-1", "AAPL", dec!(100), dec!(10.00)))
            .await;

        assert!(h.broker.submitted().is_empty());
        assert!(h.pending.is_empty());
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_closed_position_aborts_and_cleans() {
        let h = harness();
        h.pending.track("buy-1", "AAPL", dec!(100), dec!(10.00));
        h.registry.record_awaiting("AAPL", "prot-1", dec!(50));
        // No position tracked: quantity reads zero.

        h.sync
            .on_buy_fill(fill("buy-1", "AAPL", dec!(100), dec!(10.00)))
            .await;

        assert!(h.broker.submitted().is_empty());
        assert!(h.pending.is_empty());
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_redelivered_fill_is_idempotent() {
        let h = harness();
        open_position(&h, "AAPL", dec!(100));
        h.pending.track("buy-1", "AAPL", dec!(100), dec!(10.00));

        let event = fill("buy-1", "AAPL", dec!(100), dec!(10.00));
        h.sync.on_buy_fill(event.clone()).await;
        h.sync.on_buy_fill(event).await;

        assert_eq!(h.broker.submitted().len(), 1);
        assert!(h.broker.modified().is_empty());
    }

    #[tokio::test]
    async fn test_rebuy_merges_into_confirmed_order() {
        let h = harness();
        open_position(&h, "AAPL", dec!(150));
        h.registry.record_awaiting("AAPL", "prot-1", dec!(100));
        h.registry.confirm("prot-1");
        h.pending.track("buy-2", "AAPL", dec!(50), dec!(10.50));

        h.sync
            .on_buy_fill(fill("buy-2", "AAPL", dec!(50), dec!(10.50)))
            .await;

        assert!(h.broker.submitted().is_empty());
        assert_eq!(h.broker.modified(), vec![("prot-1".to_string(), dec!(150))]);
        let entry = h.registry.get("AAPL").unwrap();
        assert_eq!(entry.order_id, "prot-1");
        assert_eq!(entry.quantity, dec!(150));
    }

    #[tokio::test]
    async fn test_failed_merge_falls_back_to_creation() {
        let h = harness();
        open_position(&h, "AAPL", dec!(150));
        h.registry.record_awaiting("AAPL", "prot-1", dec!(100));
        h.registry.confirm("prot-1");
        h.broker.reject_modifications();
        h.pending.track("buy-2", "AAPL", dec!(50), dec!(10.50));

        h.sync
            .on_buy_fill(fill("buy-2", "AAPL", dec!(50), dec!(10.50)))
            .await;

        let submitted = h.broker.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].1.quantity, dec!(50));
        assert!(!h.registry.in_progress("AAPL"));
    }

    #[tokio::test]
    async fn test_cache_hit_merges_without_registry_entry() {
        let h = harness();
        open_position(&h, "AAPL", dec!(150));
        h.cache.upsert(OrderSnapshot {
            order_id: "prot-cache".to_string(),
            symbol: "AAPL".to_string(),
            side: OrderSide::Sell,
            order_type: OrderType::StopLimit,
            status: OrderStatus::Working,
            quantity: dec!(100),
            filled_quantity: Decimal::ZERO,
            limit_price: Some(dec!(9.80)),
            stop_price: Some(dec!(9.85)),
            updated_at: Utc::now(),
        });
        h.pending.track("buy-2", "AAPL", dec!(50), dec!(10.50));

        h.sync
            .on_buy_fill(fill("buy-2", "AAPL", dec!(50), dec!(10.50)))
            .await;

        assert!(h.broker.submitted().is_empty());
        assert_eq!(
            h.broker.modified(),
            vec![("prot-cache".to_string(), dec!(150))]
        );
    }

    #[tokio::test]
    async fn test_creation_cancels_competing_sells() {
        let h = harness();
        open_position(&h, "AAPL", dec!(100));
        h.cache.upsert(OrderSnapshot {
            order_id: "manual-sell".to_string(),
            symbol: "AAPL".to_string(),
            side: OrderSide::Sell,
            order_type: OrderType::Limit,
            status: OrderStatus::Working,
            quantity: dec!(100),
            filled_quantity: Decimal::ZERO,
            limit_price: Some(dec!(12.00)),
            stop_price: None,
            updated_at: Utc::now(),
        });
        h.pending.track("buy-1", "AAPL", dec!(100), dec!(10.00));

        h.sync
            .on_buy_fill(fill("buy-1", "AAPL", dec!(100), dec!(10.00)))
            .await;

        assert_eq!(h.broker.cancelled(), vec!["manual-sell".to_string()]);
        assert_eq!(h.broker.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fills_merge_to_sum() {
        let h = harness_with(ProtectiveConfig {
            locate_wait_ms: 2_000,
            locate_poll_ms: 10,
            ..Default::default()
        });
        open_position(&h, "AAPL", dec!(150));
        h.broker.set_submit_delay(Duration::from_millis(100));
        h.pending.track("buy-1", "AAPL", dec!(100), dec!(10.00));
        h.pending.track("buy-2", "AAPL", dec!(50), dec!(10.10));

        let sync = &h.sync;
        let first = sync.on_buy_fill(fill("buy-1", "AAPL", dec!(100), dec!(10.00)));
        let second = async {
            // Let the first fill claim the in-progress marker.
            tokio::time::sleep(Duration::from_millis(20)).await;
            sync.on_buy_fill(fill("buy-2", "AAPL", dec!(50), dec!(10.10)))
                .await;
        };
        tokio::join!(first, second);

        assert_eq!(h.broker.submitted().len(), 1);
        let (order_id, request) = &h.broker.submitted()[0];
        assert_eq!(request.quantity, dec!(100));
        assert_eq!(h.broker.modified(), vec![(order_id.clone(), dec!(150))]);
        assert_eq!(h.registry.get("AAPL").unwrap().quantity, dec!(150));
        assert_eq!(h.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_stuck_marker_times_out_and_creates_anyway() {
        let h = harness_with(ProtectiveConfig {
            locate_wait_ms: 100,
            locate_poll_ms: 10,
            ..Default::default()
        });
        open_position(&h, "AAPL", dec!(100));
        // Simulate a creation that hung without ever recording an order.
        h.registry.begin("AAPL");
        h.pending.track("buy-1", "AAPL", dec!(100), dec!(10.00));

        h.sync
            .on_buy_fill(fill("buy-1", "AAPL", dec!(100), dec!(10.00)))
            .await;

        // The bounded wait expired and the fill still got covered.
        assert_eq!(h.broker.submitted().len(), 1);
        assert!(h.registry.get("AAPL").is_some());
        assert!(!h.registry.in_progress("AAPL"));
    }

    #[tokio::test]
    async fn test_submission_failure_leaves_registry_consistent() {
        let h = harness();
        open_position(&h, "AAPL", dec!(100));
        h.broker.reject_submissions();
        h.pending.track("buy-1", "AAPL", dec!(100), dec!(10.00));

        h.sync
            .on_buy_fill(fill("buy-1", "AAPL", dec!(100), dec!(10.00)))
            .await;

        assert!(h.registry.is_empty());
        assert!(!h.registry.in_progress("AAPL"));
    }

    #[tokio::test]
    async fn test_ack_event_confirms_entry() {
        let h = harness();
        h.registry.record_awaiting("AAPL", "prot-1", dec!(100));

        let update = OrderUpdate {
            order: OrderSnapshot {
                order_id: "prot-1".to_string(),
                symbol: "AAPL".to_string(),
                side: OrderSide::Sell,
                order_type: OrderType::StopLimit,
                status: OrderStatus::Acknowledged,
                quantity: dec!(100),
                filled_quantity: Decimal::ZERO,
                limit_price: Some(dec!(9.80)),
                stop_price: Some(dec!(9.85)),
                updated_at: Utc::now(),
            },
            fill_price: None,
            fill_quantity: None,
            timestamp: Utc::now(),
        };
        h.sync.on_order_event(&update);

        assert_eq!(h.registry.get("AAPL").unwrap().state, ProtectiveState::Confirmed);
    }

    #[tokio::test]
    async fn test_rejection_event_removes_entry_and_marker() {
        let h = harness();
        h.registry.record_awaiting("AAPL", "prot-1", dec!(100));
        h.registry.begin("AAPL");

        let update = OrderUpdate {
            order: OrderSnapshot {
                order_id: "prot-1".to_string(),
                symbol: "AAPL".to_string(),
                side: OrderSide::Sell,
                order_type: OrderType::StopLimit,
                status: OrderStatus::Rejected,
                quantity: dec!(100),
                filled_quantity: Decimal::ZERO,
                limit_price: Some(dec!(9.80)),
                stop_price: Some(dec!(9.85)),
                updated_at: Utc::now(),
            },
            fill_price: None,
            fill_quantity: None,
            timestamp: Utc::now(),
        };
        h.sync.on_order_event(&update);

        assert!(h.registry.is_empty());
        assert!(!h.registry.in_progress("AAPL"));
    }

    #[tokio::test]
    async fn test_position_closed_cancels_awaiting_ack() {
        let h = harness();
        h.pending.track("buy-1", "AAPL", dec!(100), dec!(10.00));
        h.registry.record_awaiting("AAPL", "prot-1", dec!(100));

        h.sync.on_position_closed("AAPL").await;

        assert!(h.pending.is_empty());
        assert!(h.registry.is_empty());
        assert_eq!(h.broker.cancelled(), vec!["prot-1".to_string()]);
    }

    #[tokio::test]
    async fn test_position_closed_leaves_confirmed_order_alone() {
        let h = harness();
        h.registry.record_awaiting("AAPL", "prot-1", dec!(100));
        h.registry.confirm("prot-1");

        h.sync.on_position_closed("AAPL").await;

        assert!(h.registry.is_empty());
        assert!(h.broker.cancelled().is_empty());
    }
}
