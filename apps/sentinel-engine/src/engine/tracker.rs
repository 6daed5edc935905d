//! Position tracking with closure detection.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::models::{PositionSnapshot, PositionUpdate};

/// Mirror of brokerage positions with closure-transition detection.
///
/// A closure fires exactly once when the quantity crosses from >0 to ≤0.
/// An already-closed position re-reported at zero never fires again.
#[derive(Debug, Default)]
pub struct PositionTracker {
    positions: RwLock<HashMap<String, PositionSnapshot>>,
}

impl PositionTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current quantity for a symbol; zero when untracked.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Decimal {
        self.positions
            .read()
            .get(symbol)
            .map_or(Decimal::ZERO, |p| p.quantity)
    }

    /// Apply a position update.
    ///
    /// Returns true when this update is a closure transition.
    pub fn apply(&self, update: &PositionUpdate) -> bool {
        let mut positions = self.positions.write();
        let previous = positions
            .get(&update.symbol)
            .map_or(Decimal::ZERO, |p| p.quantity);

        positions.insert(
            update.symbol.clone(),
            PositionSnapshot {
                symbol: update.symbol.clone(),
                quantity: update.quantity,
                avg_price: update.avg_price,
                updated_at: update.timestamp,
            },
        );

        previous > Decimal::ZERO && update.quantity <= Decimal::ZERO
    }

    /// Replace the mirror with a REST snapshot. Never fires closures.
    pub fn seed(&self, snapshots: Vec<PositionSnapshot>) {
        let mut positions = self.positions.write();
        positions.clear();
        for snapshot in snapshots {
            positions.insert(snapshot.symbol.clone(), snapshot);
        }
    }

    /// All tracked positions.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PositionSnapshot> {
        self.positions.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn update(symbol: &str, quantity: Decimal) -> PositionUpdate {
        PositionUpdate {
            symbol: symbol.to_string(),
            quantity,
            avg_price: dec!(10.00),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_closure_fires_once() {
        let tracker = PositionTracker::new();

        assert!(!tracker.apply(&update("AAPL", dec!(100))));
        assert!(tracker.apply(&update("AAPL", dec!(0))));
        // Re-reported zero must not fire again
        assert!(!tracker.apply(&update("AAPL", dec!(0))));
    }

    #[test]
    fn test_unknown_symbol_at_zero_never_fires() {
        let tracker = PositionTracker::new();
        assert!(!tracker.apply(&update("TSLA", dec!(0))));
    }

    #[test]
    fn test_short_flip_counts_as_closure() {
        let tracker = PositionTracker::new();
        tracker.apply(&update("AAPL", dec!(100)));
        assert!(tracker.apply(&update("AAPL", dec!(-50))));
    }

    #[test]
    fn test_get_defaults_to_zero() {
        let tracker = PositionTracker::new();
        assert_eq!(tracker.get("AAPL"), Decimal::ZERO);

        tracker.apply(&update("AAPL", dec!(25)));
        assert_eq!(tracker.get("AAPL"), dec!(25));
    }

    #[test]
    fn test_seed_replaces_without_closures() {
        let tracker = PositionTracker::new();
        tracker.apply(&update("AAPL", dec!(100)));

        tracker.seed(vec![PositionSnapshot {
            symbol: "MSFT".to_string(),
            quantity: dec!(10),
            avg_price: dec!(300),
            updated_at: Utc::now(),
        }]);

        assert_eq!(tracker.get("AAPL"), Decimal::ZERO);
        assert_eq!(tracker.get("MSFT"), dec!(10));
        assert_eq!(tracker.snapshot().len(), 1);
    }
}
