//! Startup and reconnect state seeding.
//!
//! The engine keeps no durable state; after a start or a feed reconnect
//! it rebuilds its mirrors from REST snapshots. Live protective sells
//! found in the snapshot are adopted into the registry so the locator
//! sees them before any stream event arrives.

use crate::broker::{BrokerAdapter, BrokerError};

use super::cache::OrderCache;
use super::registry::ProtectiveOrderRegistry;
use super::tracker::PositionTracker;

/// What a seeding pass loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedSummary {
    /// Open orders mirrored.
    pub orders: usize,
    /// Protective sells adopted into the registry.
    pub protective_adopted: usize,
    /// Positions mirrored.
    pub positions: usize,
}

/// Seed the order mirror, registry, and position tracker from REST.
///
/// # Errors
///
/// Returns the first brokerage error encountered; a failed seed leaves
/// previously-mirrored state untouched.
pub async fn seed_state<B: BrokerAdapter>(
    broker: &B,
    cache: &OrderCache,
    registry: &ProtectiveOrderRegistry,
    tracker: &PositionTracker,
) -> Result<SeedSummary, BrokerError> {
    let mut summary = SeedSummary::default();

    let orders = broker.list_open_orders().await?;
    summary.orders = orders.len();
    for order in &orders {
        cache.upsert(order.clone());
    }
    for order in orders.iter().filter(|o| o.is_open_protective_sell()) {
        registry.adopt(order);
        summary.protective_adopted += 1;
        tracing::info!(
            symbol = %order.symbol,
            order_id = %order.order_id,
            status = %order.status,
            "Adopted live protective order from snapshot"
        );
    }

    let positions = broker.list_positions().await?;
    summary.positions = positions.len();
    tracker.seed(positions);

    tracing::info!(
        orders = summary.orders,
        protective_adopted = summary.protective_adopted,
        positions = summary.positions,
        "State seeded from brokerage snapshot"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MockBroker;
    use crate::models::{OrderSide, OrderSnapshot, OrderStatus, OrderType, PositionSnapshot};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn order(order_id: &str, symbol: &str, order_type: OrderType, side: OrderSide) -> OrderSnapshot {
        OrderSnapshot {
            order_id: order_id.to_string(),
            symbol: symbol.to_string(),
            side,
            order_type,
            status: OrderStatus::Working,
            quantity: dec!(100),
            filled_quantity: Decimal::ZERO,
            limit_price: None,
            stop_price: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_seed_adopts_protective_sells_only() {
        let broker = MockBroker::new();
        broker.set_open_orders(vec![
            order("ord-1", "AAPL", OrderType::StopLimit, OrderSide::Sell),
            order("ord-2", "MSFT", OrderType::Limit, OrderSide::Buy),
        ]);
        broker.set_positions(vec![PositionSnapshot {
            symbol: "AAPL".to_string(),
            quantity: dec!(100),
            avg_price: dec!(10.00),
            updated_at: Utc::now(),
        }]);

        let cache = OrderCache::new();
        let registry = ProtectiveOrderRegistry::new();
        let tracker = PositionTracker::new();

        let summary = seed_state(&broker, &cache, &registry, &tracker)
            .await
            .unwrap();

        assert_eq!(summary.orders, 2);
        assert_eq!(summary.protective_adopted, 1);
        assert_eq!(summary.positions, 1);
        assert_eq!(cache.len(), 2);
        assert!(registry.get("AAPL").is_some());
        assert!(registry.get("MSFT").is_none());
        assert_eq!(tracker.get("AAPL"), dec!(100));
    }
}
