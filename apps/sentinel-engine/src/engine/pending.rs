//! Registry of buy orders submitted by this engine.
//!
//! An entry lives from submission until the order resolves to a terminal
//! status or ages past the staleness window. Entries are owned here
//! exclusively; `resolve` hands the entry out exactly once, which is what
//! makes duplicate fill delivery harmless downstream.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;

/// A tracked buy order awaiting resolution.
#[derive(Debug, Clone, Serialize)]
pub struct PendingBuyEntry {
    /// Brokerage order ID.
    pub order_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Requested quantity.
    pub quantity: Decimal,
    /// Reference price used when sizing the protective order.
    pub reference_price: Decimal,
    /// When tracking started.
    pub tracked_at: DateTime<Utc>,
}

impl PendingBuyEntry {
    /// Age of this entry at `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.tracked_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Registry of buy orders submitted by this engine.
#[derive(Debug)]
pub struct PendingBuyRegistry {
    entries: Mutex<HashMap<String, PendingBuyEntry>>,
    staleness: Duration,
}

impl PendingBuyRegistry {
    /// Create a registry with the given staleness window.
    #[must_use]
    pub fn new(staleness: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            staleness,
        }
    }

    /// Start tracking a submitted buy.
    ///
    /// Returns false (and leaves the existing entry untouched) when the
    /// order is already tracked.
    pub fn track(
        &self,
        order_id: &str,
        symbol: &str,
        quantity: Decimal,
        reference_price: Decimal,
    ) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(order_id) {
            tracing::warn!(
                order_id = %order_id,
                symbol = %symbol,
                "Buy order already tracked, ignoring duplicate track"
            );
            return false;
        }
        entries.insert(
            order_id.to_string(),
            PendingBuyEntry {
                order_id: order_id.to_string(),
                symbol: symbol.to_string(),
                quantity,
                reference_price,
                tracked_at: Utc::now(),
            },
        );
        true
    }

    /// Remove and return the entry for a resolved order.
    ///
    /// The first caller wins; a redelivered terminal event finds nothing.
    #[must_use]
    pub fn resolve(&self, order_id: &str) -> Option<PendingBuyEntry> {
        self.entries.lock().remove(order_id)
    }

    /// Returns true when the entry has outlived the staleness window.
    #[must_use]
    pub fn is_stale(&self, entry: &PendingBuyEntry, now: DateTime<Utc>) -> bool {
        entry.age(now) > self.staleness
    }

    /// Remove every entry for a symbol, regardless of age or status.
    pub fn cleanup_symbol(&self, symbol: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.symbol != symbol);
        before - entries.len()
    }

    /// Remove and return every entry past the staleness window.
    pub fn reap_stale(&self, now: DateTime<Utc>) -> Vec<PendingBuyEntry> {
        let mut entries = self.entries.lock();
        let stale_ids: Vec<String> = entries
            .values()
            .filter(|e| e.age(now) > self.staleness)
            .map(|e| e.order_id.clone())
            .collect();
        stale_ids
            .iter()
            .filter_map(|id| entries.remove(id))
            .collect()
    }

    /// All tracked entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PendingBuyEntry> {
        self.entries.lock().values().cloned().collect()
    }

    /// Returns true when a given order is tracked.
    #[must_use]
    pub fn contains(&self, order_id: &str) -> bool {
        self.entries.lock().contains_key(order_id)
    }

    /// Number of tracked entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn registry() -> PendingBuyRegistry {
        PendingBuyRegistry::new(Duration::from_secs(300))
    }

    #[test]
    fn test_track_and_resolve() {
        let pending = registry();
        assert!(pending.track("ord-1", "AAPL", dec!(100), dec!(10.00)));

        let entry = pending.resolve("ord-1").unwrap();
        assert_eq!(entry.symbol, "AAPL");
        assert_eq!(entry.quantity, dec!(100));
        // Second resolve finds nothing
        assert!(pending.resolve("ord-1").is_none());
    }

    #[test]
    fn test_duplicate_track_rejected() {
        let pending = registry();
        assert!(pending.track("ord-1", "AAPL", dec!(100), dec!(10.00)));
        assert!(!pending.track("ord-1", "AAPL", dec!(50), dec!(11.00)));

        let entry = pending.resolve("ord-1").unwrap();
        assert_eq!(entry.quantity, dec!(100));
    }

    #[test]
    fn test_staleness() {
        let pending = registry();
        pending.track("ord-1", "AAPL", dec!(100), dec!(10.00));
        let entry = pending.snapshot().pop().unwrap();

        assert!(!pending.is_stale(&entry, Utc::now()));
        let later = Utc::now() + chrono::Duration::seconds(301);
        assert!(pending.is_stale(&entry, later));
    }

    #[test]
    fn test_cleanup_symbol_removes_all_matching() {
        let pending = registry();
        pending.track("ord-1", "AAPL", dec!(100), dec!(10.00));
        pending.track("ord-2", "AAPL", dec!(50), dec!(10.50));
        pending.track("ord-3", "MSFT", dec!(10), dec!(300.00));

        assert_eq!(pending.cleanup_symbol("AAPL"), 2);
        assert_eq!(pending.len(), 1);
        assert!(pending.contains("ord-3"));
        // Idempotent on an already-clean symbol
        assert_eq!(pending.cleanup_symbol("AAPL"), 0);
    }

    #[test]
    fn test_reap_stale() {
        let pending = registry();
        pending.track("ord-1", "AAPL", dec!(100), dec!(10.00));

        assert!(pending.reap_stale(Utc::now()).is_empty());
        let later = Utc::now() + chrono::Duration::seconds(400);
        let reaped = pending.reap_stale(later);
        assert_eq!(reaped.len(), 1);
        assert!(pending.is_empty());
    }
}
