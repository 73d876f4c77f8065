//! Side effect executor port.
//!
//! The dispatcher owns retry and deduplication; executors perform one
//! attempt and report how it went.

use async_trait::async_trait;
use thiserror::Error;

use super::{LedgerError, NotificationError};
use crate::domain::dispatch::SideEffect;
use crate::domain::foundation::DomainError;

#[derive(Debug, Clone, Error)]
pub enum SideEffectError {
    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Order lookup failed: {0}")]
    Repository(#[from] DomainError),

    #[error("Order {0} not found")]
    OrderNotFound(String),
}

impl SideEffectError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SideEffectError::Notification(NotificationError::NotConfigured(_)) => false,
            SideEffectError::Notification(NotificationError::Rejected { status, .. }) => {
                *status >= 500 || *status == 429
            }
            SideEffectError::Notification(NotificationError::Transport(_)) => true,
            SideEffectError::Ledger(err) => err.is_retryable(),
            SideEffectError::Repository(_) => true,
            SideEffectError::OrderNotFound(_) => false,
        }
    }
}

#[async_trait]
pub trait SideEffectExecutor: Send + Sync {
    /// Performs a single attempt of `effect`.
    async fn execute(&self, effect: &SideEffect) -> Result<(), SideEffectError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_effect_executor_is_object_safe() {
        fn _accepts_dyn(_executor: &dyn SideEffectExecutor) {}
    }

    #[test]
    fn configuration_errors_are_not_retryable() {
        let err: SideEffectError = NotificationError::NotConfigured("RESEND_API_KEY".into()).into();
        assert!(!err.is_retryable());
        let err: SideEffectError = LedgerError::NotConfigured("client_id".into()).into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_errors_are_retryable() {
        let err: SideEffectError = LedgerError::Timeout.into();
        assert!(err.is_retryable());
        let err: SideEffectError = NotificationError::Rejected {
            status: 503,
            message: "busy".into(),
        }
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn wraps_ledger_errors_transparently() {
        let err: SideEffectError = LedgerError::Timeout.into();
        assert_eq!(err.to_string(), "Ledger request timed out");
    }
}
