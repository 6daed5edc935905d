//! Mock broker adapter for testing.
//!
//! Returns simulated responses without touching the network and records
//! every call so tests can assert on exactly what the engine sent.
//! Order IDs are generated sequentially starting from 1.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::models::{OrderSnapshot, PositionSnapshot};

use super::{BrokerAdapter, BrokerError, OrderRequest};

/// Mock broker adapter for testing.
#[derive(Debug, Default)]
pub struct MockBroker {
    order_counter: AtomicU64,
    submitted: Mutex<Vec<(String, OrderRequest)>>,
    cancelled: Mutex<Vec<String>>,
    modified: Mutex<Vec<(String, Decimal)>>,
    open_orders: Mutex<Vec<OrderSnapshot>>,
    positions: Mutex<Vec<PositionSnapshot>>,
    fail_submissions: AtomicBool,
    fail_modifications: AtomicBool,
    submit_delay: Mutex<Option<Duration>>,
}

impl MockBroker {
    /// Create a new mock broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent submission returns a rejection.
    pub fn reject_submissions(&self) {
        self.fail_submissions.store(true, Ordering::SeqCst);
    }

    /// Every subsequent modification returns a rejection.
    pub fn reject_modifications(&self) {
        self.fail_modifications.store(true, Ordering::SeqCst);
    }

    /// Delay every submission by `delay` before responding.
    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock() = Some(delay);
    }

    /// Seed the open-order listing returned by `list_open_orders`.
    pub fn set_open_orders(&self, orders: Vec<OrderSnapshot>) {
        *self.open_orders.lock() = orders;
    }

    /// Seed the position listing returned by `list_positions`.
    pub fn set_positions(&self, positions: Vec<PositionSnapshot>) {
        *self.positions.lock() = positions;
    }

    /// All submissions recorded so far as `(order_id, request)`.
    #[must_use]
    pub fn submitted(&self) -> Vec<(String, OrderRequest)> {
        self.submitted.lock().clone()
    }

    /// All cancel requests recorded so far.
    #[must_use]
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }

    /// All modifications recorded so far as `(order_id, new_quantity)`.
    #[must_use]
    pub fn modified(&self) -> Vec<(String, Decimal)> {
        self.modified.lock().clone()
    }
}

#[async_trait]
impl BrokerAdapter for MockBroker {
    async fn submit_order(&self, request: &OrderRequest) -> Result<String, BrokerError> {
        let delay = *self.submit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(BrokerError::OrderRejected("simulated rejection".to_string()));
        }

        let seq = self.order_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let order_id = format!("ord-{seq}");
        self.submitted.lock().push((order_id.clone(), request.clone()));
        Ok(order_id)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        self.cancelled.lock().push(order_id.to_string());
        Ok(())
    }

    async fn modify_order(
        &self,
        order_id: &str,
        new_quantity: Decimal,
    ) -> Result<(), BrokerError> {
        if self.fail_modifications.load(Ordering::SeqCst) {
            return Err(BrokerError::OrderRejected(
                "simulated modify rejection".to_string(),
            ));
        }
        self.modified
            .lock()
            .push((order_id.to_string(), new_quantity));
        Ok(())
    }

    async fn list_open_orders(&self) -> Result<Vec<OrderSnapshot>, BrokerError> {
        Ok(self.open_orders.lock().clone())
    }

    async fn list_positions(&self) -> Result<Vec<PositionSnapshot>, BrokerError> {
        Ok(self.positions.lock().clone())
    }

    fn broker_name(&self) -> &'static str {
        "mock"
    }

    async fn health_check(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}
