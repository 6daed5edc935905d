//! Consolidated "does a protective order exist" query.
//!
//! Every caller that needs to know whether a symbol already carries a
//! protective order goes through this locator; there are no partial
//! existence checks at call sites.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::models::OrderStatus;

use super::cache::OrderCache;
use super::registry::{ProtectiveOrderRegistry, ProtectiveState};

/// A protective order located for a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatedProtective {
    /// Found with brokerage acknowledgment observed.
    Confirmed {
        /// Brokerage order ID.
        order_id: String,
        /// Current protective quantity.
        quantity: Decimal,
    },
    /// Found, acknowledgment not yet observed.
    AwaitingAck {
        /// Brokerage order ID.
        order_id: String,
        /// Current protective quantity.
        quantity: Decimal,
    },
}

impl LocatedProtective {
    /// Brokerage order ID of the located order.
    #[must_use]
    pub fn order_id(&self) -> &str {
        match self {
            Self::Confirmed { order_id, .. } | Self::AwaitingAck { order_id, .. } => order_id,
        }
    }

    /// Current quantity of the located order.
    #[must_use]
    pub const fn quantity(&self) -> Decimal {
        match self {
            Self::Confirmed { quantity, .. } | Self::AwaitingAck { quantity, .. } => *quantity,
        }
    }
}

/// Read-only protective-order lookup across all local sources.
#[derive(Debug, Clone)]
pub struct StopLimitLocator {
    registry: Arc<ProtectiveOrderRegistry>,
    cache: Arc<OrderCache>,
}

impl StopLimitLocator {
    /// Create a locator over the registry and order cache.
    #[must_use]
    pub const fn new(registry: Arc<ProtectiveOrderRegistry>, cache: Arc<OrderCache>) -> Self {
        Self { registry, cache }
    }

    /// Locate the protective order for a symbol, if one exists.
    ///
    /// Consults, in priority order: the confirmed registry entry
    /// (authoritative), the awaiting-acknowledgment entry, then a scan of
    /// the full order cache for a live STOP_LIMIT SELL the registries
    /// missed (restart, race). Absence is a normal outcome.
    #[must_use]
    pub fn find(&self, symbol: &str) -> Option<LocatedProtective> {
        if let Some(entry) = self.registry.get(symbol) {
            return Some(match entry.state {
                ProtectiveState::Confirmed => LocatedProtective::Confirmed {
                    order_id: entry.order_id,
                    quantity: entry.quantity,
                },
                ProtectiveState::AwaitingAck => LocatedProtective::AwaitingAck {
                    order_id: entry.order_id,
                    quantity: entry.quantity,
                },
            });
        }

        let order = self.cache.open_protective_sell(symbol)?;
        let remaining = order.quantity;
        Some(if order.status == OrderStatus::Submitted {
            LocatedProtective::AwaitingAck {
                order_id: order.order_id,
                quantity: remaining,
            }
        } else {
            LocatedProtective::Confirmed {
                order_id: order.order_id,
                quantity: remaining,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderSide, OrderSnapshot, OrderType};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn locator() -> (Arc<ProtectiveOrderRegistry>, Arc<OrderCache>, StopLimitLocator) {
        let registry = Arc::new(ProtectiveOrderRegistry::new());
        let cache = Arc::new(OrderCache::new());
        let locator = StopLimitLocator::new(Arc::clone(&registry), Arc::clone(&cache));
        (registry, cache, locator)
    }

    fn protective_order(order_id: &str, symbol: &str, status: OrderStatus) -> OrderSnapshot {
        OrderSnapshot {
            order_id: order_id.to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            order_type: OrderType::StopLimit,
            status,
            quantity: dec!(100),
            filled_quantity: Decimal::ZERO,
            limit_price: Some(dec!(9.80)),
            stop_price: Some(dec!(9.85)),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_absence_is_normal() {
        let (_, _, locator) = locator();
        assert!(locator.find("AAPL").is_none());
    }

    #[test]
    fn test_registry_entry_wins_over_cache() {
        let (registry, cache, locator) = locator();
        registry.record_awaiting("AAPL", "ord-reg", dec!(50));
        cache.upsert(protective_order("ord-cache", "AAPL", OrderStatus::Working));

        let found = locator.find("AAPL").unwrap();
        assert_eq!(found.order_id(), "ord-reg");
        assert_eq!(found.quantity(), dec!(50));
        assert!(matches!(found, LocatedProtective::AwaitingAck { .. }));
    }

    #[test]
    fn test_confirmed_state_reported() {
        let (registry, _, locator) = locator();
        registry.record_awaiting("AAPL", "ord-1", dec!(100));
        registry.confirm("ord-1");

        assert!(matches!(
            locator.find("AAPL").unwrap(),
            LocatedProtective::Confirmed { .. }
        ));
    }

    #[test]
    fn test_cache_fallback_catches_missed_orders() {
        let (_, cache, locator) = locator();
        cache.upsert(protective_order("ord-1", "AAPL", OrderStatus::Working));

        let found = locator.find("AAPL").unwrap();
        assert_eq!(found.order_id(), "ord-1");
        assert!(matches!(found, LocatedProtective::Confirmed { .. }));
    }

    #[test]
    fn test_cache_submitted_maps_to_awaiting() {
        let (_, cache, locator) = locator();
        cache.upsert(protective_order("ord-1", "AAPL", OrderStatus::Submitted));

        assert!(matches!(
            locator.find("AAPL").unwrap(),
            LocatedProtective::AwaitingAck { .. }
        ));
    }

    #[test]
    fn test_terminal_cache_orders_ignored() {
        let (_, cache, locator) = locator();
        cache.upsert(protective_order("ord-1", "AAPL", OrderStatus::Filled));
        assert!(locator.find("AAPL").is_none());
    }
}
