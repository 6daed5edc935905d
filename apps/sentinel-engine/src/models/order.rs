//! Order types mirrored from the brokerage.
//!
//! The brokerage owns every order; the engine holds a read-only mirror
//! built from the order-update stream and REST snapshots. Status strings
//! from the wire are normalized into the six canonical statuses at the
//! stream boundary via [`OrderStatus::from_broker`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Market order - execute at best available price.
    Market,
    /// Limit order - execute at specified price or better.
    Limit,
    /// Stop-limit order - becomes limit order when stop price is reached.
    StopLimit,
}

/// Time in force for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    /// Valid for current trading day only.
    Day,
    /// Good-til-canceled.
    Gtc,
}

/// Canonical order status in the lifecycle.
///
/// Brokerage-native status codes collapse into these six. The engine
/// tolerates missed intermediate statuses: an order may go straight from
/// `Submitted` to `Filled` without `Acknowledged` ever being observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Submitted to the brokerage, acceptance not yet reported.
    Submitted,
    /// Accepted by the brokerage.
    Acknowledged,
    /// Live at the exchange (includes partial fills).
    Working,
    /// Completely filled.
    Filled,
    /// Cancelled.
    Cancelled,
    /// Rejected by the brokerage.
    Rejected,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }

    /// Returns true if the order is still live at the brokerage.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Submitted | Self::Acknowledged | Self::Working)
    }

    /// Normalize a brokerage-native status string.
    ///
    /// Unknown strings map to `Working` (the nearest non-terminal status)
    /// so that an unrecognized update never fabricates a terminal
    /// transition; the caller is expected to log the raw value.
    #[must_use]
    pub fn from_broker(raw: &str) -> Self {
        match raw {
            "pending_new" => Self::Submitted,
            "new" | "accepted" | "accepted_for_bidding" => Self::Acknowledged,
            "partially_filled" | "held" | "pending_cancel" | "pending_replace" | "calculated" => {
                Self::Working
            }
            "filled" => Self::Filled,
            "canceled" | "expired" | "done_for_day" | "replaced" | "stopped" => Self::Cancelled,
            "rejected" | "suspended" => Self::Rejected,
            _ => Self::Working,
        }
    }

    /// Returns true if the raw brokerage status string is recognized.
    #[must_use]
    pub fn is_known_broker_status(raw: &str) -> bool {
        matches!(
            raw,
            "pending_new"
                | "new"
                | "accepted"
                | "accepted_for_bidding"
                | "partially_filled"
                | "held"
                | "pending_cancel"
                | "pending_replace"
                | "calculated"
                | "filled"
                | "canceled"
                | "expired"
                | "done_for_day"
                | "replaced"
                | "stopped"
                | "rejected"
                | "suspended"
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Submitted => "SUBMITTED",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Working => "WORKING",
            Self::Filled => "FILLED",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
        };
        write!(f, "{name}")
    }
}

/// Read-only mirror of a single brokerage order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// Brokerage order ID.
    pub order_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Canonical status.
    pub status: OrderStatus,
    /// Requested quantity.
    pub quantity: Decimal,
    /// Filled quantity so far.
    pub filled_quantity: Decimal,
    /// Limit price (if applicable).
    pub limit_price: Option<Decimal>,
    /// Stop price (if applicable).
    pub stop_price: Option<Decimal>,
    /// Last update timestamp reported by the brokerage.
    pub updated_at: DateTime<Utc>,
}

impl OrderSnapshot {
    /// Returns true if this order is a protective sell (STOP_LIMIT SELL).
    #[must_use]
    pub fn is_protective_sell(&self) -> bool {
        self.side == OrderSide::Sell && self.order_type == OrderType::StopLimit
    }

    /// Returns true if this order is a live protective sell.
    #[must_use]
    pub fn is_open_protective_sell(&self) -> bool {
        self.is_protective_sell() && self.status.is_open()
    }
}

/// A normalized order-update event from the stream.
///
/// Carries the full mirrored order plus the incremental fill fields the
/// brokerage attaches to fill events.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    /// Mirrored order after this update.
    pub order: OrderSnapshot,
    /// Price of the fill that produced this event, if any.
    pub fill_price: Option<Decimal>,
    /// Quantity of the fill that produced this event, if any.
    pub fill_quantity: Option<Decimal>,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Resolved status for the per-order status query.
///
/// `Pending` while the order is tracked locally and not yet terminal;
/// otherwise the brokerage-reported terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolvedOrderStatus {
    /// Tracked locally, not yet resolved by a terminal event.
    Pending,
    /// Brokerage-reported terminal status.
    Terminal(OrderStatus),
}
