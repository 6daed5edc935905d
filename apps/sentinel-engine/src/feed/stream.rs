//! WebSocket client for the brokerage event streams.
//!
//! One [`FeedStream`] drives one socket: authenticate, subscribe, then
//! pump frames into the engine channel. On any failure the stream
//! reconnects with jittered backoff and asks the engine to re-seed,
//! since events may have been missed while disconnected. Delivery is
//! therefore at-least-once with possible gaps; the engine is built to
//! tolerate both.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::config::{BrokerConfig, FeedsConfig};
use crate::engine::EngineEvent;
use crate::observability::{record_feed_connected, record_feed_reconnect};

use super::messages::{
    AuthRequest, InboundMessage, ListenRequest, POSITION_UPDATES_STREAM, TRADE_UPDATES_STREAM,
    decode,
};
use super::reconnect::ReconnectPolicy;
use super::FeedError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a connection's read loop ended.
enum Disconnect {
    /// Shutdown was requested; do not reconnect.
    Cancelled,
    /// The engine side of the channel is gone; do not reconnect.
    EngineGone,
    /// Transport-level interruption; reconnect.
    Transport(&'static str),
}

/// A reconnecting consumer of one brokerage event stream.
pub struct FeedStream {
    label: &'static str,
    listen_stream: &'static str,
    url: String,
    api_key: String,
    api_secret: String,
    config: FeedsConfig,
    events: mpsc::Sender<EngineEvent>,
    cancel: CancellationToken,
}

impl FeedStream {
    /// Build the order-update stream consumer.
    #[must_use]
    pub fn orders(
        feeds: &FeedsConfig,
        broker: &BrokerConfig,
        events: mpsc::Sender<EngineEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            label: "orders",
            listen_stream: TRADE_UPDATES_STREAM,
            url: feeds.order_stream_url.clone(),
            api_key: broker.api_key.clone(),
            api_secret: broker.api_secret.clone(),
            config: feeds.clone(),
            events,
            cancel,
        }
    }

    /// Build the position-update stream consumer.
    #[must_use]
    pub fn positions(
        feeds: &FeedsConfig,
        broker: &BrokerConfig,
        events: mpsc::Sender<EngineEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            label: "positions",
            listen_stream: POSITION_UPDATES_STREAM,
            url: feeds.position_stream_url.clone(),
            api_key: broker.api_key.clone(),
            api_secret: broker.api_secret.clone(),
            config: feeds.clone(),
            events,
            cancel,
        }
    }

    /// Run until cancelled, the engine stops, or reconnects are exhausted.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::ReconnectExhausted` when the configured
    /// attempt limit is hit. Cancellation and engine shutdown are clean
    /// exits.
    pub async fn run(self) -> Result<(), FeedError> {
        let mut policy = ReconnectPolicy::from_config(&self.config);
        let mut connected_before = false;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            match self.connect_and_subscribe().await {
                Ok(mut ws) => {
                    policy.reset();
                    record_feed_connected(self.label, true);
                    tracing::info!(stream = self.label, url = %self.url, "Feed connected");

                    if connected_before {
                        // Events may have been dropped while down; the
                        // engine re-seeds from REST to close the gap.
                        if self.events.send(EngineEvent::Resync).await.is_err() {
                            return Ok(());
                        }
                    }
                    connected_before = true;

                    let disconnect = self.read_loop(&mut ws).await;
                    record_feed_connected(self.label, false);
                    match disconnect {
                        Disconnect::Cancelled => {
                            let _ = ws.close(None).await;
                            tracing::info!(stream = self.label, "Feed stopping");
                            return Ok(());
                        }
                        Disconnect::EngineGone => {
                            tracing::info!(stream = self.label, "Engine stopped, feed stopping");
                            return Ok(());
                        }
                        Disconnect::Transport(reason) => {
                            tracing::warn!(stream = self.label, reason, "Feed disconnected");
                        }
                    }
                }
                Err(error) => {
                    record_feed_connected(self.label, false);
                    tracing::warn!(stream = self.label, error = %error, "Feed connection failed");
                    if matches!(error, FeedError::AuthenticationFailed) {
                        // Credentials will not fix themselves; surface it.
                        return Err(error);
                    }
                }
            }

            record_feed_reconnect(self.label);
            let Some(delay) = policy.next_backoff() else {
                tracing::error!(
                    stream = self.label,
                    attempts = policy.attempt(),
                    "Reconnect attempts exhausted"
                );
                return Err(FeedError::ReconnectExhausted);
            };
            tracing::info!(
                stream = self.label,
                attempt = policy.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting after backoff"
            );
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.cancel.cancelled() => return Ok(()),
            }
        }
    }

    /// Connect, authenticate, and subscribe to this stream.
    async fn connect_and_subscribe(&self) -> Result<WsStream, FeedError> {
        let (mut ws, _) = connect_async(self.url.as_str()).await?;

        let auth = serde_json::to_string(&AuthRequest::new(&self.api_key, &self.api_secret))
            .map_err(|e| FeedError::Codec(e.to_string()))?;
        ws.send(Message::text(auth)).await?;

        // Wait for the authorization verdict, skipping unrelated frames.
        let deadline = tokio::time::Instant::now() + self.config.heartbeat_timeout();
        loop {
            let frame = tokio::time::timeout_at(deadline, ws.next())
                .await
                .map_err(|_| FeedError::ConnectionFailed("authorization timed out".to_string()))?;
            let Some(frame) = frame else {
                return Err(FeedError::ConnectionFailed(
                    "closed during authorization".to_string(),
                ));
            };
            match frame? {
                Message::Text(text) => match decode(text.as_str()) {
                    Ok(InboundMessage::Authorization { authorized: true }) => break,
                    Ok(InboundMessage::Authorization { authorized: false }) => {
                        return Err(FeedError::AuthenticationFailed);
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::warn!(stream = self.label, error = %error, "Undecodable frame during authorization");
                    }
                },
                Message::Ping(payload) => ws.send(Message::Pong(payload)).await?,
                Message::Close(_) => {
                    return Err(FeedError::ConnectionFailed(
                        "closed during authorization".to_string(),
                    ));
                }
                _ => {}
            }
        }

        let listen = serde_json::to_string(&ListenRequest::new(self.listen_stream))
            .map_err(|e| FeedError::Codec(e.to_string()))?;
        ws.send(Message::text(listen)).await?;

        Ok(ws)
    }

    /// Pump frames into the engine until something ends the connection.
    async fn read_loop(&self, ws: &mut WsStream) -> Disconnect {
        loop {
            let frame = tokio::select! {
                frame = tokio::time::timeout(self.config.heartbeat_timeout(), ws.next()) => frame,
                () = self.cancel.cancelled() => return Disconnect::Cancelled,
            };

            let message = match frame {
                Err(_) => return Disconnect::Transport("heartbeat timeout"),
                Ok(None) => return Disconnect::Transport("stream ended"),
                Ok(Some(Err(error))) => {
                    tracing::warn!(stream = self.label, error = %error, "WebSocket error");
                    return Disconnect::Transport("websocket error");
                }
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(text) => {
                    if !self.dispatch(text.as_str()).await {
                        return Disconnect::EngineGone;
                    }
                }
                Message::Ping(payload) => {
                    if ws.send(Message::Pong(payload)).await.is_err() {
                        return Disconnect::Transport("pong failed");
                    }
                }
                Message::Close(_) => return Disconnect::Transport("server closed"),
                _ => {}
            }
        }
    }

    /// Decode one frame and forward it. Returns false when the engine
    /// channel is closed.
    async fn dispatch(&self, text: &str) -> bool {
        let event = match decode(text) {
            Ok(InboundMessage::OrderUpdate(update)) => EngineEvent::Order(update),
            Ok(InboundMessage::PositionUpdate(update)) => EngineEvent::Position(update),
            Ok(InboundMessage::Listening) => {
                tracing::info!(stream = self.label, "Stream subscription confirmed");
                return true;
            }
            Ok(InboundMessage::Authorization { .. }) => return true,
            Ok(InboundMessage::Unknown(name)) => {
                tracing::debug!(stream = self.label, message_stream = %name, "Ignoring unconsumed stream");
                return true;
            }
            Err(error) => {
                // One bad frame is not worth a reconnect.
                tracing::warn!(stream = self.label, error = %error, "Dropping undecodable frame");
                return true;
            }
        };

        self.events.send(event).await.is_ok()
    }
}
