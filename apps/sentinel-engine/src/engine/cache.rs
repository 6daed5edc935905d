//! Read-only mirror of brokerage order state.
//!
//! Built from stream events and REST snapshots. Events for one order
//! arrive in non-decreasing timestamp order, but the feed may redeliver
//! after a reconnect; an update older than the mirrored state is dropped.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::models::{OrderSide, OrderSnapshot};

/// Mirror of all brokerage orders seen by the engine.
#[derive(Debug, Default)]
pub struct OrderCache {
    orders: RwLock<HashMap<String, OrderSnapshot>>,
}

impl OrderCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an order snapshot, keeping the newest state per order.
    ///
    /// Returns false when the snapshot is older than what is already
    /// mirrored (a redelivery) and was dropped.
    pub fn upsert(&self, order: OrderSnapshot) -> bool {
        let mut orders = self.orders.write();
        if let Some(existing) = orders.get(&order.order_id) {
            if existing.updated_at > order.updated_at {
                return false;
            }
        }
        orders.insert(order.order_id.clone(), order);
        true
    }

    /// Get an order by ID.
    #[must_use]
    pub fn get(&self, order_id: &str) -> Option<OrderSnapshot> {
        self.orders.read().get(order_id).cloned()
    }

    /// Find the live protective sell for a symbol, if any.
    ///
    /// Scans the full mirror so that protective orders the registries
    /// missed (restart, race) are still found.
    #[must_use]
    pub fn open_protective_sell(&self, symbol: &str) -> Option<OrderSnapshot> {
        self.orders
            .read()
            .values()
            .find(|o| o.symbol == symbol && o.is_open_protective_sell())
            .cloned()
    }

    /// All live sell orders for a symbol.
    #[must_use]
    pub fn open_sells(&self, symbol: &str) -> Vec<OrderSnapshot> {
        self.orders
            .read()
            .values()
            .filter(|o| o.symbol == symbol && o.side == OrderSide::Sell && o.status.is_open())
            .cloned()
            .collect()
    }

    /// Total number of mirrored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    /// Returns true when no orders are mirrored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }

    /// Drop terminal orders whose last update is older than `retention`.
    ///
    /// Keeps the mirror bounded; recent terminal orders stay visible for
    /// the per-order status query.
    pub fn prune_terminal(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        let mut orders = self.orders.write();
        let before = orders.len();
        orders.retain(|_, o| !(o.status.is_terminal() && now - o.updated_at > retention));
        before - orders.len()
    }
}
