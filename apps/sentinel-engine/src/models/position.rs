//! Position types mirrored from the brokerage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Read-only mirror of a single brokerage position.
///
/// Quantity is signed; a quantity ≤ 0 means no protective order should
/// remain tracked for the symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Instrument symbol.
    pub symbol: String,
    /// Signed quantity.
    pub quantity: Decimal,
    /// Average entry price.
    pub avg_price: Decimal,
    /// Last update timestamp reported by the brokerage.
    pub updated_at: DateTime<Utc>,
}

/// A normalized position-update event from the stream.
#[derive(Debug, Clone)]
pub struct PositionUpdate {
    /// Instrument symbol.
    pub symbol: String,
    /// Signed quantity after the update.
    pub quantity: Decimal,
    /// Average entry price after the update.
    pub avg_price: Decimal,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_snapshot_round_trip() {
        let snapshot = PositionSnapshot {
            symbol: "MSFT".to_string(),
            quantity: Decimal::new(50, 0),
            avg_price: Decimal::new(31025, 2),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: PositionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.symbol, "MSFT");
        assert_eq!(back.quantity, Decimal::new(50, 0));
    }
}
