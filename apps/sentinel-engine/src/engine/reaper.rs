//! Periodic sweep of registry entries that no longer match live orders.
//!
//! The event stream is allowed to drop terminal events; the reaper is the
//! backstop that keeps the registries honest. It re-validates every
//! protective entry against the order mirror and ages out pending buys
//! that were never resolved.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::ReaperConfig;
use crate::observability::{record_reaped, record_registry_sizes};

use super::cache::OrderCache;
use super::pending::PendingBuyRegistry;
use super::registry::ProtectiveOrderRegistry;

/// Result of a single sweep, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepOutcome {
    /// Protective entries removed.
    pub protective_removed: usize,
    /// Pending buy entries removed.
    pub pending_removed: usize,
    /// Terminal orders pruned from the mirror.
    pub orders_pruned: usize,
}

/// Periodic stale-entry reaper.
pub struct StaleEntryReaper {
    pending: Arc<PendingBuyRegistry>,
    registry: Arc<ProtectiveOrderRegistry>,
    cache: Arc<OrderCache>,
    config: ReaperConfig,
}

impl StaleEntryReaper {
    /// Create a reaper over shared engine state.
    #[must_use]
    pub const fn new(
        pending: Arc<PendingBuyRegistry>,
        registry: Arc<ProtectiveOrderRegistry>,
        cache: Arc<OrderCache>,
        config: ReaperConfig,
    ) -> Self {
        Self {
            pending,
            registry,
            cache,
            config,
        }
    }

    /// Run the periodic sweep until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        if !self.config.enabled {
            tracing::info!("Stale-entry reaper disabled by configuration");
            return;
        }

        let mut interval = tokio::time::interval(self.config.period());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh start
        // does not sweep before any state exists.
        interval.tick().await;

        tracing::info!(
            period_secs = self.config.period_secs,
            "Stale-entry reaper started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let outcome = self.sweep();
                    if outcome != SweepOutcome::default() {
                        tracing::info!(
                            protective_removed = outcome.protective_removed,
                            pending_removed = outcome.pending_removed,
                            orders_pruned = outcome.orders_pruned,
                            "Reaper sweep removed stale entries"
                        );
                    }
                }
                () = cancel.cancelled() => {
                    tracing::info!("Stale-entry reaper stopping");
                    return;
                }
            }
        }
    }

    /// Run one sweep over both registries and the order mirror.
    pub fn sweep(&self) -> SweepOutcome {
        let now = Utc::now();
        let mut outcome = SweepOutcome::default();

        // Re-validate every protective entry against the live mirror.
        for entry in self.registry.snapshot() {
            let Some(order) = self.cache.get(&entry.order_id) else {
                // The mirror may simply lag the registry; leave it for
                // the next sweep or a terminal event.
                continue;
            };

            let mismatched = order.symbol != entry.symbol || !order.is_protective_sell();
            if order.status.is_terminal() || mismatched {
                tracing::warn!(
                    symbol = %entry.symbol,
                    order_id = %entry.order_id,
                    status = %order.status,
                    mismatched,
                    "Reaping protective entry that no longer matches a live order"
                );
                if self.registry.remove_order(&entry.order_id).is_some() {
                    outcome.protective_removed += 1;
                }
            }
        }

        // Age out pending buys whose terminal event was never delivered.
        let reaped = self.pending.reap_stale(now);
        for entry in &reaped {
            tracing::warn!(
                order_id = %entry.order_id,
                symbol = %entry.symbol,
                age_secs = entry.age(now).as_secs(),
                "Reaping pending buy past the staleness window"
            );
        }
        outcome.pending_removed = reaped.len();

        outcome.orders_pruned = self
            .cache
            .prune_terminal(now, self.config.terminal_retention());

        record_reaped("protective", outcome.protective_removed);
        record_reaped("pending", outcome.pending_removed);
        record_registry_sizes(self.pending.len(), self.registry.len());

        outcome
    }
}
