//! Order repository port.
//!
//! The storefront database owns orders; payments only read them and write
//! payment fields. Status changes go through a compare-and-set so that of
//! two concurrent deliveries for the same order exactly one wins.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrderId};
use crate::domain::order::{LedgerSyncState, OrderRecord, PaymentStatusUpdate};
use crate::domain::payment::{PaymentEventRecord, PaymentProviderKind, PaymentStatus};

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<OrderRecord>, DomainError>;

    async fn find_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderRecord>, DomainError>;

    async fn find_by_session_id(&self, session_id: &str)
        -> Result<Option<OrderRecord>, DomainError>;

    async fn find_by_payment_id(&self, payment_id: &str)
        -> Result<Option<OrderRecord>, DomainError>;

    /// Records the provider and session opened for the order.
    async fn record_session(
        &self,
        id: &OrderId,
        provider: PaymentProviderKind,
        session_id: &str,
    ) -> Result<(), DomainError>;

    /// Applies `update` only if the stored status still equals `expected`.
    ///
    /// Returns `false` when another writer got there first.
    async fn transition_payment(
        &self,
        id: &OrderId,
        expected: PaymentStatus,
        update: PaymentStatusUpdate,
    ) -> Result<bool, DomainError>;

    async fn record_ledger_sync(
        &self,
        id: &OrderId,
        state: LedgerSyncState,
    ) -> Result<(), DomainError>;

    async fn append_payment_event(&self, record: PaymentEventRecord) -> Result<(), DomainError>;

    async fn payment_events(&self, id: &OrderId) -> Result<Vec<PaymentEventRecord>, DomainError>;
}
