//! Retry with exponential backoff for brokerage API calls.
//!
//! Only transport faults and rate limits are retried; rejections and
//! auth failures propagate immediately. Submissions carry a client order
//! ID, so a retried submit whose first attempt actually landed resolves
//! to the same order at the brokerage.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::BrokerConfig;

use super::BrokerError;

/// Retry policy for brokerage API calls.
#[derive(Debug, Clone)]
pub struct BrokerRetryPolicy {
    /// Maximum number of attempts (first call included).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier per attempt.
    pub multiplier: f64,
    /// Jitter factor (0.2 = ±20%).
    pub jitter_factor: f64,
}

impl BrokerRetryPolicy {
    /// Build the policy from broker configuration.
    #[must_use]
    pub const fn from_config(config: &BrokerConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            initial_backoff: Duration::from_millis(config.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(config.retry_max_backoff_ms),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }
}

impl Default for BrokerRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Tracks attempts and computes jittered exponential delays.
#[derive(Debug)]
pub struct BackoffCalculator {
    policy: BrokerRetryPolicy,
    attempts: u32,
}

impl BackoffCalculator {
    /// Create a calculator from a policy.
    #[must_use]
    pub fn new(policy: &BrokerRetryPolicy) -> Self {
        Self {
            policy: policy.clone(),
            attempts: 1,
        }
    }

    /// Attempts made so far (the initial call counts as one).
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay before the next attempt, or `None` when attempts are spent.
    ///
    /// A rate-limit error with a server-provided retry-after extends the
    /// computed delay to at least that long.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn next_delay(&mut self, error: &BrokerError) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }

        let exponent = i32::try_from(self.attempts - 1).unwrap_or(i32::MAX);
        let base_ms = self.policy.initial_backoff.as_millis() as f64
            * self.policy.multiplier.powi(exponent);
        let capped = base_ms.min(self.policy.max_backoff.as_millis() as f64);

        let jitter = self.policy.jitter_factor;
        let scale = if jitter > 0.0 {
            rand::rng().random_range((1.0 - jitter)..(1.0 + jitter))
        } else {
            1.0
        };
        let mut delay = Duration::from_millis((capped * scale) as u64);

        if let BrokerError::RateLimited { retry_after_secs } = error {
            delay = delay.max(Duration::from_secs(*retry_after_secs));
        }

        self.attempts += 1;
        Some(delay)
    }
}

/// Run a brokerage call, retrying retryable failures with backoff.
///
/// # Errors
///
/// Returns the last error once attempts are spent, or immediately for
/// non-retryable errors.
pub async fn with_retry<T, F, Fut>(
    policy: &BrokerRetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, BrokerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrokerError>>,
{
    let mut backoff = BackoffCalculator::new(policy);
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() => {
                let Some(delay) = backoff.next_delay(&error) else {
                    tracing::warn!(
                        operation = %operation,
                        attempts = backoff.attempts(),
                        error = %error,
                        "Brokerage call failed, retries exhausted"
                    );
                    return Err(error);
                };
                tracing::warn!(
                    operation = %operation,
                    attempt = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Brokerage call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> BrokerRetryPolicy {
        BrokerRetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn test_delays_grow_and_cap() {
        let policy = BrokerRetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            multiplier: 2.0,
            jitter_factor: 0.0,
        };
        let mut backoff = BackoffCalculator::new(&policy);
        let err = BrokerError::Transport("reset".to_string());

        assert_eq!(backoff.next_delay(&err), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(&err), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(&err), Some(Duration::from_millis(300)));
        assert_eq!(backoff.next_delay(&err), Some(Duration::from_millis(300)));
    }

    #[test]
    fn test_attempts_exhaust() {
        let mut backoff = BackoffCalculator::new(&fast_policy(2));
        let err = BrokerError::Transport("reset".to_string());
        assert!(backoff.next_delay(&err).is_some());
        assert!(backoff.next_delay(&err).is_none());
    }

    #[test]
    fn test_rate_limit_extends_delay() {
        let mut backoff = BackoffCalculator::new(&fast_policy(3));
        let err = BrokerError::RateLimited { retry_after_secs: 2 };
        let delay = backoff.next_delay(&err).unwrap();
        assert!(delay >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_with_retry_recovers() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "test", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(BrokerError::Transport("flap".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_rejection() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = with_retry(&fast_policy(5), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BrokerError::OrderRejected("no".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
