//! Broker adapter trait definition.
//!
//! The port every brokerage integration implements. The engine talks to
//! the brokerage exclusively through this trait; registries and the
//! synchronizer never see transport details.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{OrderSide, OrderSnapshot, OrderType, PositionSnapshot, TimeInForce};

use super::BrokerError;

/// A single order submission request.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Client-generated idempotency key. Retrying a submission with the
    /// same key never creates a second order at the brokerage.
    pub client_order_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Requested quantity.
    pub quantity: Decimal,
    /// Limit price (LIMIT and STOP_LIMIT).
    pub limit_price: Option<Decimal>,
    /// Stop price (STOP_LIMIT).
    pub stop_price: Option<Decimal>,
}

impl OrderRequest {
    /// Build a day LIMIT BUY entry order.
    #[must_use]
    pub fn limit_buy(symbol: impl Into<String>, quantity: Decimal, limit_price: Decimal) -> Self {
        Self {
            client_order_id: Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Day,
            quantity,
            limit_price: Some(limit_price),
            stop_price: None,
        }
    }

    /// Build a good-til-cancelled STOP_LIMIT SELL protective order.
    #[must_use]
    pub fn protective_sell(
        symbol: impl Into<String>,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            client_order_id: Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side: OrderSide::Sell,
            order_type: OrderType::StopLimit,
            time_in_force: TimeInForce::Gtc,
            quantity,
            limit_price: Some(limit_price),
            stop_price: Some(stop_price),
        }
    }
}

/// Trait for brokerage trading-API adapters.
///
/// Implementations map these calls onto the brokerage REST API. Transport
/// faults are retried inside the adapter with backoff; rejections are
/// surfaced as-is and never retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Submit a single order.
    ///
    /// Returns the brokerage-assigned order ID on acceptance into the
    /// brokerage's pipeline. Acceptance is not acknowledgment: the order
    /// starts its life as SUBMITTED until the event stream reports
    /// otherwise.
    async fn submit_order(&self, request: &OrderRequest) -> Result<String, BrokerError>;

    /// Cancel an order.
    ///
    /// Cancellation is not guaranteed; the order may already be filled or
    /// in a non-cancelable state.
    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError>;

    /// Replace an order's quantity, keeping its identity stable.
    async fn modify_order(&self, order_id: &str, new_quantity: Decimal)
    -> Result<(), BrokerError>;

    /// List all open (non-terminal) orders.
    async fn list_open_orders(&self) -> Result<Vec<OrderSnapshot>, BrokerError>;

    /// List all current positions.
    async fn list_positions(&self) -> Result<Vec<PositionSnapshot>, BrokerError>;

    /// Broker name for logging and metrics.
    fn broker_name(&self) -> &'static str;

    /// Check brokerage connection health.
    async fn health_check(&self) -> Result<(), BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_limit_buy_request() {
        let request = OrderRequest::limit_buy("AAPL", dec!(100), dec!(150.25));
        assert_eq!(request.side, OrderSide::Buy);
        assert_eq!(request.order_type, OrderType::Limit);
        assert_eq!(request.time_in_force, TimeInForce::Day);
        assert_eq!(request.limit_price, Some(dec!(150.25)));
        assert!(request.stop_price.is_none());
        assert!(!request.client_order_id.is_empty());
    }

    #[test]
    fn test_protective_sell_request() {
        let request = OrderRequest::protective_sell("AAPL", dec!(100), dec!(9.85), dec!(9.80));
        assert_eq!(request.side, OrderSide::Sell);
        assert_eq!(request.order_type, OrderType::StopLimit);
        assert_eq!(request.time_in_force, TimeInForce::Gtc);
        assert_eq!(request.stop_price, Some(dec!(9.85)));
        assert_eq!(request.limit_price, Some(dec!(9.80)));
    }

    #[test]
    fn test_client_order_ids_unique() {
        let a = OrderRequest::limit_buy("AAPL", dec!(1), dec!(1));
        let b = OrderRequest::limit_buy("AAPL", dec!(1), dec!(1));
        assert_ne!(a.client_order_id, b.client_order_id);
    }
}
