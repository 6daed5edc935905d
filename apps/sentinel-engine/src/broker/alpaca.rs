//! Alpaca trading-API adapter.
//!
//! Implements [`BrokerAdapter`] over the Alpaca v2 REST API. Transport
//! faults and rate limits are retried with backoff; a retried submission
//! reuses its client order ID, so the brokerage deduplicates any attempt
//! that actually landed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::config::BrokerConfig;
use crate::models::{
    OrderSide, OrderSnapshot, OrderStatus, OrderType, PositionSnapshot, TimeInForce,
};

use super::retry::{BrokerRetryPolicy, with_retry};
use super::{BrokerAdapter, BrokerError, OrderRequest};

const KEY_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

/// Alpaca trading-API adapter.
#[derive(Debug, Clone)]
pub struct AlpacaTradingApi {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    retry: BrokerRetryPolicy,
}

impl AlpacaTradingApi {
    /// Create an adapter from broker configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationFailed` when credentials are missing, or a
    /// transport error when the HTTP client cannot be built.
    pub fn new(config: &BrokerConfig) -> Result<Self, BrokerError> {
        if !config.has_credentials() {
            return Err(BrokerError::AuthenticationFailed);
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BrokerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            retry: BrokerRetryPolicy::from_config(config),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(KEY_HEADER, &self.api_key)
            .header(SECRET_HEADER, &self.api_secret)
    }

    async fn send_for_order(&self, request: RequestBuilder) -> Result<ApiOrder, BrokerError> {
        let response = request
            .send()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;
        let response = check_status(response).await?;
        response
            .json::<ApiOrder>()
            .await
            .map_err(|e| BrokerError::MalformedResponse(e.to_string()))
    }

    async fn send_for_unit(&self, request: RequestBuilder) -> Result<(), BrokerError> {
        let response = request
            .send()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;
        check_status(response).await.map(|_| ())
    }
}

#[async_trait]
impl BrokerAdapter for AlpacaTradingApi {
    async fn submit_order(&self, request: &OrderRequest) -> Result<String, BrokerError> {
        let body = order_body(request);
        let order = with_retry(&self.retry, "submit_order", || {
            self.send_for_order(self.request(Method::POST, "/v2/orders").json(&body))
        })
        .await?;
        Ok(order.id)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        let path = format!("/v2/orders/{order_id}");
        with_retry(&self.retry, "cancel_order", || {
            self.send_for_unit(self.request(Method::DELETE, &path))
        })
        .await
    }

    async fn modify_order(
        &self,
        order_id: &str,
        new_quantity: Decimal,
    ) -> Result<(), BrokerError> {
        let path = format!("/v2/orders/{order_id}");
        let body = json!({ "qty": new_quantity.to_string() });
        with_retry(&self.retry, "modify_order", || {
            self.send_for_order(self.request(Method::PATCH, &path).json(&body))
        })
        .await
        .map(|_| ())
    }

    async fn list_open_orders(&self) -> Result<Vec<OrderSnapshot>, BrokerError> {
        let orders: Vec<ApiOrder> = with_retry(&self.retry, "list_open_orders", || async {
            let response = self
                .request(Method::GET, "/v2/orders")
                .query(&[("status", "open"), ("limit", "500")])
                .send()
                .await
                .map_err(|e| BrokerError::Transport(e.to_string()))?;
            let response = check_status(response).await?;
            response
                .json()
                .await
                .map_err(|e| BrokerError::MalformedResponse(e.to_string()))
        })
        .await?;

        orders.into_iter().map(ApiOrder::into_snapshot).collect()
    }

    async fn list_positions(&self) -> Result<Vec<PositionSnapshot>, BrokerError> {
        let positions: Vec<ApiPosition> = with_retry(&self.retry, "list_positions", || async {
            let response = self
                .request(Method::GET, "/v2/positions")
                .send()
                .await
                .map_err(|e| BrokerError::Transport(e.to_string()))?;
            let response = check_status(response).await?;
            response
                .json()
                .await
                .map_err(|e| BrokerError::MalformedResponse(e.to_string()))
        })
        .await?;

        positions
            .into_iter()
            .map(ApiPosition::into_snapshot)
            .collect()
    }

    fn broker_name(&self) -> &'static str {
        "alpaca"
    }

    async fn health_check(&self) -> Result<(), BrokerError> {
        self.send_for_unit(self.request(Method::GET, "/v2/account"))
            .await
    }
}

/// Map an error response to a typed broker error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BrokerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let url_path = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BrokerError::AuthenticationFailed,
        StatusCode::TOO_MANY_REQUESTS => BrokerError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(60),
        },
        StatusCode::NOT_FOUND => BrokerError::OrderNotFound(url_path),
        StatusCode::UNPROCESSABLE_ENTITY => BrokerError::OrderRejected(message),
        s if s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT => {
            BrokerError::Transport(format!("{s}: {message}"))
        }
        s => BrokerError::Api {
            code: s.as_u16().to_string(),
            message,
        },
    })
}

fn order_body(request: &OrderRequest) -> serde_json::Value {
    let mut body = json!({
        "client_order_id": request.client_order_id,
        "symbol": request.symbol,
        "qty": request.quantity.to_string(),
        "side": side_str(request.side),
        "type": type_str(request.order_type),
        "time_in_force": tif_str(request.time_in_force),
    });
    if let Some(limit) = request.limit_price {
        body["limit_price"] = json!(limit.to_string());
    }
    if let Some(stop) = request.stop_price {
        body["stop_price"] = json!(stop.to_string());
    }
    body
}

const fn side_str(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

const fn type_str(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
        OrderType::StopLimit => "stop_limit",
    }
}

const fn tif_str(tif: TimeInForce) -> &'static str {
    match tif {
        TimeInForce::Day => "day",
        TimeInForce::Gtc => "gtc",
    }
}

/// Order payload as returned by the trading API.
#[derive(Debug, Deserialize)]
struct ApiOrder {
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

impl ApiOrder {
    fn into_snapshot(self) -> Result<OrderSnapshot, BrokerError> {
        let side = if self.side == "buy" {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let order_type = match self.order_type.as_str() {
            "limit" => OrderType::Limit,
            "stop_limit" => OrderType::StopLimit,
            "market" => OrderType::Market,
            other => {
                // Types the engine never places still compete for the
                // position; mirror them as non-protective.
                tracing::debug!(order_id = %self.id, order_type = %other, "Unrecognized order type");
                OrderType::Market
            }
        };

        Ok(OrderSnapshot {
            order_id: self.id,
            symbol: self.symbol,
            side,
            order_type,
            status: OrderStatus::from_broker(&self.status),
            quantity: parse_decimal(self.qty.as_deref())?.unwrap_or(Decimal::ZERO),
            filled_quantity: parse_decimal(self.filled_qty.as_deref())?.unwrap_or(Decimal::ZERO),
            limit_price: parse_decimal(self.limit_price.as_deref())?,
            stop_price: parse_decimal(self.stop_price.as_deref())?,
            updated_at: self.updated_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Position payload as returned by the trading API.
#[derive(Debug, Deserialize)]
struct ApiPosition {
    symbol: String,
    qty: String,
    #[serde(default)]
    avg_entry_price: Option<String>,
}

impl ApiPosition {
    fn into_snapshot(self) -> Result<PositionSnapshot, BrokerError> {
        Ok(PositionSnapshot {
            symbol: self.symbol,
            quantity: parse_decimal(Some(&self.qty))?.unwrap_or(Decimal::ZERO),
            avg_price: parse_decimal(self.avg_entry_price.as_deref())?.unwrap_or(Decimal::ZERO),
            updated_at: Utc::now(),
        })
    }
}

/// Error body as returned by the trading API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn parse_decimal(raw: Option<&str>) -> Result<Option<Decimal>, BrokerError> {
    raw.map(|v| {
        v.parse::<Decimal>()
            .map_err(|e| BrokerError::MalformedResponse(format!("bad decimal '{v}': {e}")))
    })
    .transpose()
}
