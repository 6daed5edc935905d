//! Reconnection backoff for the event streams.

use std::time::Duration;

use rand::Rng;

use crate::config::FeedsConfig;

/// Exponential backoff with full jitter for stream reconnects.
///
/// Each delay is drawn uniformly from zero to the capped exponential
/// bound, which spreads reconnect storms across time. A max-attempt
/// count of zero means retry forever.
#[derive(Debug)]
pub struct ReconnectPolicy {
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    max_attempts: u32,
    attempt: u32,
}

impl ReconnectPolicy {
    /// Build a policy from feed configuration.
    #[must_use]
    pub const fn from_config(config: &FeedsConfig) -> Self {
        Self {
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            multiplier: config.backoff_multiplier,
            max_attempts: config.max_reconnect_attempts,
            attempt: 0,
        }
    }

    /// Delay before the next reconnect attempt, or `None` when attempts
    /// are exhausted.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.max_attempts > 0 && self.attempt >= self.max_attempts {
            return None;
        }

        let exponent = i32::try_from(self.attempt).unwrap_or(i32::MAX);
        let bound_ms = (self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent))
            .min(self.max_backoff.as_millis() as f64);
        let jittered = rand::rng().random_range(0.0..=bound_ms);

        self.attempt = self.attempt.saturating_add(1);
        Some(Duration::from_millis(jittered as u64))
    }

    /// Reset after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Reconnect attempts made since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}
