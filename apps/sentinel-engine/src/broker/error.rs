//! Error types for brokerage operations.

/// Errors from brokerage trading-API operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Transport-level failure (connection, timeout, DNS).
    #[error("transport error: {0}")]
    Transport(String),

    /// API returned an error body.
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status or broker error code.
        code: String,
        /// Error message from the brokerage.
        message: String,
    },

    /// Order was rejected.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Rate limited.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Order not found.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// Response body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl BrokerError {
    /// Returns true when retrying the call with backoff is safe and useful.
    ///
    /// Rejections are never retryable: resubmitting a rejected protective
    /// order risks duplicate exposure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_and_rate_limit_retryable() {
        assert!(BrokerError::Transport("timeout".to_string()).is_retryable());
        assert!(BrokerError::RateLimited { retry_after_secs: 2 }.is_retryable());
    }

    #[test]
    fn test_rejection_not_retryable() {
        assert!(!BrokerError::OrderRejected("insufficient qty".to_string()).is_retryable());
        assert!(!BrokerError::AuthenticationFailed.is_retryable());
        assert!(!BrokerError::OrderNotFound("ord-1".to_string()).is_retryable());
    }
}
