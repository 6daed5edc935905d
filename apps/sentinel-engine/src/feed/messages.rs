//! Wire messages for the brokerage event streams.
//!
//! Both streams speak JSON envelopes of the form
//! `{"stream": "...", "data": {...}}`. Decoding normalizes broker-native
//! side/type/status strings into the engine's canonical model at this
//! boundary; nothing downstream sees raw wire strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{OrderSide, OrderSnapshot, OrderStatus, OrderType, OrderUpdate, PositionUpdate};

use super::FeedError;

/// Stream name for order updates.
pub const TRADE_UPDATES_STREAM: &str = "trade_updates";

/// Stream name for position updates.
pub const POSITION_UPDATES_STREAM: &str = "position_updates";

/// Outbound authentication request.
#[derive(Debug, Serialize)]
pub struct AuthRequest<'a> {
    action: &'static str,
    data: AuthData<'a>,
}

#[derive(Debug, Serialize)]
struct AuthData<'a> {
    key_id: &'a str,
    secret_key: &'a str,
}

impl<'a> AuthRequest<'a> {
    /// Build an authentication request.
    #[must_use]
    pub const fn new(key_id: &'a str, secret_key: &'a str) -> Self {
        Self {
            action: "authenticate",
            data: AuthData { key_id, secret_key },
        }
    }
}

/// Outbound stream-listen request.
#[derive(Debug, Serialize)]
pub struct ListenRequest<'a> {
    action: &'static str,
    data: ListenData<'a>,
}

#[derive(Debug, Serialize)]
struct ListenData<'a> {
    streams: Vec<&'a str>,
}

impl<'a> ListenRequest<'a> {
    /// Build a listen request for one stream.
    #[must_use]
    pub fn new(stream: &'a str) -> Self {
        Self {
            action: "listen",
            data: ListenData {
                streams: vec![stream],
            },
        }
    }
}

/// A decoded inbound message.
#[derive(Debug)]
pub enum InboundMessage {
    /// Authentication outcome.
    Authorization {
        /// True when the server authorized the session.
        authorized: bool,
    },
    /// Listen confirmation; streams now flowing.
    Listening,
    /// An order update.
    OrderUpdate(OrderUpdate),
    /// A position update.
    PositionUpdate(PositionUpdate),
    /// A stream the engine does not consume.
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    stream: String,
    data: Value,
}

#[derive(Debug, Deserialize)]
struct AuthorizationData {
    status: String,
}

#[derive(Debug, Deserialize)]
struct TradeUpdateData {
    #[allow(dead_code)]
    #[serde(default)]
    event: Option<String>,
    order: WireOrder,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    qty: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WireOrder {
    id: String,
    symbol: String,
    side: String,
    #[serde(rename = "type")]
    order_type: String,
    status: String,
    #[serde(default)]
    qty: Option<String>,
    #[serde(default)]
    filled_qty: Option<String>,
    #[serde(default)]
    limit_price: Option<String>,
    #[serde(default)]
    stop_price: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct PositionUpdateData {
    symbol: String,
    qty: String,
    #[serde(default)]
    avg_entry_price: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Decode one inbound frame.
///
/// # Errors
///
/// Returns `FeedError::Codec` when the frame is not a valid envelope or
/// a known stream's payload fails to parse.
pub fn decode(text: &str) -> Result<InboundMessage, FeedError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| FeedError::Codec(e.to_string()))?;

    match envelope.stream.as_str() {
        "authorization" => {
            let data: AuthorizationData = parse_data(envelope.data)?;
            Ok(InboundMessage::Authorization {
                authorized: data.status == "authorized",
            })
        }
        "listening" => Ok(InboundMessage::Listening),
        TRADE_UPDATES_STREAM => {
            let data: TradeUpdateData = parse_data(envelope.data)?;
            Ok(InboundMessage::OrderUpdate(data.into_update()?))
        }
        POSITION_UPDATES_STREAM => {
            let data: PositionUpdateData = parse_data(envelope.data)?;
            Ok(InboundMessage::PositionUpdate(data.into_update()?))
        }
        other => Ok(InboundMessage::Unknown(other.to_string())),
    }
}

fn parse_data<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, FeedError> {
    serde_json::from_value(data).map_err(|e| FeedError::Codec(e.to_string()))
}

impl TradeUpdateData {
    fn into_update(self) -> Result<OrderUpdate, FeedError> {
        let status = normalize_status(&self.order.id, &self.order.status);
        let side = if self.order.side == "buy" {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let order_type = match self.order.order_type.as_str() {
            "limit" => OrderType::Limit,
            "stop_limit" => OrderType::StopLimit,
            _ => OrderType::Market,
        };

        let timestamp = self.timestamp.unwrap_or_else(Utc::now);
        let order = OrderSnapshot {
            order_id: self.order.id,
            symbol: self.order.symbol,
            side,
            order_type,
            status,
            quantity: parse_decimal(self.order.qty.as_deref())?.unwrap_or(Decimal::ZERO),
            filled_quantity: parse_decimal(self.order.filled_qty.as_deref())?
                .unwrap_or(Decimal::ZERO),
            limit_price: parse_decimal(self.order.limit_price.as_deref())?,
            stop_price: parse_decimal(self.order.stop_price.as_deref())?,
            updated_at: self.order.updated_at.unwrap_or(timestamp),
        };

        Ok(OrderUpdate {
            order,
            fill_price: parse_decimal(self.price.as_deref())?,
            fill_quantity: parse_decimal(self.qty.as_deref())?,
            timestamp,
        })
    }
}

impl PositionUpdateData {
    fn into_update(self) -> Result<PositionUpdate, FeedError> {
        Ok(PositionUpdate {
            symbol: self.symbol,
            quantity: parse_decimal(Some(&self.qty))?.unwrap_or(Decimal::ZERO),
            avg_price: parse_decimal(self.avg_entry_price.as_deref())?.unwrap_or(Decimal::ZERO),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

fn normalize_status(order_id: &str, raw: &str) -> OrderStatus {
    if !OrderStatus::is_known_broker_status(raw) {
        tracing::warn!(
            order_id = %order_id,
            raw_status = %raw,
            "Unknown order status from stream, treating as WORKING"
        );
    }
    OrderStatus::from_broker(raw)
}

fn parse_decimal(raw: Option<&str>) -> Result<Option<Decimal>, FeedError> {
    raw.map(|v| {
        v.parse::<Decimal>()
            .map_err(|e| FeedError::Codec(format!("bad decimal '{v}': {e}")))
    })
    .transpose()
}
