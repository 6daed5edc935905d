//! Brokerage event-stream consumption.
//!
//! Two [`FeedStream`] instances (orders, positions) are the engine's only
//! event sources. Wire decoding and status normalization live in
//! [`messages`]; reconnect pacing lives in [`reconnect`].

pub mod messages;
mod reconnect;
mod stream;

pub use reconnect::ReconnectPolicy;
pub use stream::FeedStream;

/// Errors from the event streams.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Connection or handshake failed.
    #[error("feed connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The brokerage refused the stream credentials.
    #[error("feed authentication failed")]
    AuthenticationFailed,

    /// A frame could not be decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Reconnect attempts exhausted.
    #[error("maximum reconnection attempts exceeded")]
    ReconnectExhausted,
}
