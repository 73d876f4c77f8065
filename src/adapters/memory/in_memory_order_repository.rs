//! In-memory order repository.
//!
//! Stands in for the storefront database in local runs and tests. State
//! lives in one process; a restart forgets every order.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, OrderId};
use crate::domain::order::{LedgerSyncState, OrderRecord, PaymentStatusUpdate};
use crate::domain::payment::{PaymentEventRecord, PaymentProviderKind, PaymentStatus};
use crate::ports::OrderRepository;

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, OrderRecord>>,
    events: RwLock<Vec<PaymentEventRecord>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an order.
    pub async fn insert(&self, order: OrderRecord) {
        self.orders.write().await.insert(order.id, order);
    }

    fn not_found(id: &OrderId) -> DomainError {
        DomainError::new(ErrorCode::OrderNotFound, format!("Order {} not found", id))
            .with_detail("order_id", id.to_string())
    }

    async fn find_where<P>(&self, predicate: P) -> Option<OrderRecord>
    where
        P: Fn(&OrderRecord) -> bool,
    {
        self.orders
            .read()
            .await
            .values()
            .find(|order| predicate(order))
            .cloned()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<OrderRecord>, DomainError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn find_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderRecord>, DomainError> {
        Ok(self
            .find_where(|o| o.order_number.as_str() == order_number)
            .await)
    }

    async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<OrderRecord>, DomainError> {
        Ok(self
            .find_where(|o| o.provider_session_id.as_deref() == Some(session_id))
            .await)
    }

    async fn find_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<OrderRecord>, DomainError> {
        Ok(self
            .find_where(|o| o.provider_payment_id.as_deref() == Some(payment_id))
            .await)
    }

    async fn record_session(
        &self,
        id: &OrderId,
        provider: PaymentProviderKind,
        session_id: &str,
    ) -> Result<(), DomainError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        order.payment_provider = Some(provider);
        order.provider_session_id = Some(session_id.to_string());
        Ok(())
    }

    async fn transition_payment(
        &self,
        id: &OrderId,
        expected: PaymentStatus,
        update: PaymentStatusUpdate,
    ) -> Result<bool, DomainError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(id).ok_or_else(|| Self::not_found(id))?;

        if order.payment_status != expected {
            tracing::debug!(
                order_id = %id,
                expected = %expected,
                actual = %order.payment_status,
                "Payment status changed concurrently, update skipped"
            );
            return Ok(false);
        }

        order.apply_payment_update(update);
        Ok(true)
    }

    async fn record_ledger_sync(
        &self,
        id: &OrderId,
        state: LedgerSyncState,
    ) -> Result<(), DomainError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        order.ledger_sync = state;
        Ok(())
    }

    async fn append_payment_event(&self, record: PaymentEventRecord) -> Result<(), DomainError> {
        self.events.write().await.push(record);
        Ok(())
    }

    async fn payment_events(&self, id: &OrderId) -> Result<Vec<PaymentEventRecord>, DomainError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| &e.order_id == id)
            .cloned()
            .collect())
    }
}
