//! Registry of protective sell orders and the per-symbol creation marker.
//!
//! Entries are keyed by symbol, which structurally enforces the invariant
//! that at most one protective order is tracked per symbol at any instant.
//! The in-progress marker is a mutual-exclusion token gating concurrent
//! creation/update sequences for a symbol; it owns nothing.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{OrderSnapshot, OrderStatus};

/// Lifecycle state of a tracked protective order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtectiveState {
    /// Submitted, brokerage acceptance not yet seen on the stream.
    AwaitingAck,
    /// Acknowledged by the brokerage.
    Confirmed,
}

impl std::fmt::Display for ProtectiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingAck => write!(f, "AWAITING_ACK"),
            Self::Confirmed => write!(f, "CONFIRMED"),
        }
    }
}

/// A tracked protective order.
#[derive(Debug, Clone, Serialize)]
pub struct ProtectiveEntry {
    /// Instrument symbol.
    pub symbol: String,
    /// Brokerage order ID.
    pub order_id: String,
    /// Lifecycle state.
    pub state: ProtectiveState,
    /// Last known protective quantity.
    pub quantity: Decimal,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Registry of protective sell orders per symbol.
#[derive(Debug, Default)]
pub struct ProtectiveOrderRegistry {
    entries: Mutex<HashMap<String, ProtectiveEntry>>,
    in_progress: Mutex<HashSet<String>>,
}

impl ProtectiveOrderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly-submitted protective order as awaiting acknowledgment.
    pub fn record_awaiting(&self, symbol: &str, order_id: &str, quantity: Decimal) {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(symbol) {
            tracing::warn!(
                symbol = %symbol,
                existing_order_id = %existing.order_id,
                new_order_id = %order_id,
                "Replacing existing protective entry"
            );
        }
        entries.insert(
            symbol.to_string(),
            ProtectiveEntry {
                symbol: symbol.to_string(),
                order_id: order_id.to_string(),
                state: ProtectiveState::AwaitingAck,
                quantity,
                recorded_at: Utc::now(),
            },
        );
    }

    /// Adopt a live protective sell discovered in a brokerage snapshot.
    ///
    /// Used when re-seeding state after a restart or reconnect. A
    /// SUBMITTED order adopts as awaiting acknowledgment; anything else
    /// live adopts as confirmed.
    pub fn adopt(&self, order: &OrderSnapshot) {
        let state = if order.status == OrderStatus::Submitted {
            ProtectiveState::AwaitingAck
        } else {
            ProtectiveState::Confirmed
        };
        self.entries.lock().insert(
            order.symbol.clone(),
            ProtectiveEntry {
                symbol: order.symbol.clone(),
                order_id: order.order_id.clone(),
                state,
                quantity: order.quantity,
                recorded_at: Utc::now(),
            },
        );
    }

    /// Promote an awaiting entry to confirmed.
    ///
    /// Returns the symbol when a promotion happened. Idempotent: an
    /// already-confirmed entry is left alone.
    pub fn confirm(&self, order_id: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        let entry = entries
            .values_mut()
            .find(|e| e.order_id == order_id && e.state == ProtectiveState::AwaitingAck)?;
        entry.state = ProtectiveState::Confirmed;
        Some(entry.symbol.clone())
    }

    /// Remove the entry referencing an order, if any.
    pub fn remove_order(&self, order_id: &str) -> Option<ProtectiveEntry> {
        let mut entries = self.entries.lock();
        let symbol = entries
            .values()
            .find(|e| e.order_id == order_id)
            .map(|e| e.symbol.clone())?;
        entries.remove(&symbol)
    }

    /// Remove the entry for a symbol, if any. Idempotent.
    pub fn cleanup_symbol(&self, symbol: &str) -> Option<ProtectiveEntry> {
        self.entries.lock().remove(symbol)
    }

    /// Get the entry for a symbol.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<ProtectiveEntry> {
        self.entries.lock().get(symbol).cloned()
    }

    /// Get the entry referencing an order.
    #[must_use]
    pub fn find_by_order(&self, order_id: &str) -> Option<ProtectiveEntry> {
        self.entries
            .lock()
            .values()
            .find(|e| e.order_id == order_id)
            .cloned()
    }

    /// Update the tracked quantity after a successful modification.
    pub fn set_quantity(&self, symbol: &str, quantity: Decimal) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(symbol) {
            Some(entry) => {
                entry.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Try to set the in-progress marker for a symbol.
    ///
    /// Returns true when this caller set it; false when another
    /// creation/update sequence already holds it.
    pub fn begin(&self, symbol: &str) -> bool {
        self.in_progress.lock().insert(symbol.to_string())
    }

    /// Release the in-progress marker for a symbol. Idempotent.
    pub fn end(&self, symbol: &str) {
        self.in_progress.lock().remove(symbol);
    }

    /// Returns true when a creation/update sequence is in flight.
    #[must_use]
    pub fn in_progress(&self, symbol: &str) -> bool {
        self.in_progress.lock().contains(symbol)
    }

    /// Symbols with an in-flight creation/update sequence.
    #[must_use]
    pub fn in_progress_symbols(&self) -> Vec<String> {
        self.in_progress.lock().iter().cloned().collect()
    }

    /// All tracked entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProtectiveEntry> {
        self.entries.lock().values().cloned().collect()
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
