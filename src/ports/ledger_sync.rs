//! Ledger sync port for the external accounting system.
//!
//! A sync posts a settled order under its order number as external
//! reference, so a retried sync is recognized by the remote side instead
//! of creating a second entry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::order::OrderRecord;

/// Result of posting an order to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSyncReceipt {
    /// Identifier the ledger assigned to the transaction.
    pub external_transaction_id: String,

    pub success: bool,

    /// True when the ledger already held this order (conflict answer).
    pub deduplicated: bool,
}

/// Ledger-side view of a synced transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransactionStatus {
    pub external_transaction_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Ledger sync not configured: missing {0}")]
    NotConfigured(String),

    #[error("Order {order_number} is not paid")]
    OrderNotPaid { order_number: String },

    #[error("Ledger answered {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Ledger request failed: {0}")]
    Transport(String),

    #[error("Ledger request timed out")]
    Timeout,
}

impl LedgerError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Timeout | LedgerError::Transport(_) => true,
            LedgerError::Remote { status, .. } => *status >= 500 || *status == 401 || *status == 429,
            LedgerError::NotConfigured(_) | LedgerError::OrderNotPaid { .. } => false,
        }
    }
}

/// Port for the accounting-system sync.
#[async_trait]
pub trait LedgerSync: Send + Sync {
    /// Post a paid order. Precondition: paid with a settlement time.
    async fn sync(&self, order: &OrderRecord) -> Result<LedgerSyncReceipt, LedgerError>;

    /// Look up a previously synced transaction.
    async fn transaction_status(
        &self,
        external_transaction_id: &str,
    ) -> Result<LedgerTransactionStatus, LedgerError>;
}
