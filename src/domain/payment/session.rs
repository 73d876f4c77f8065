//! Checkout session types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Currency, PaymentProviderKind, PaymentStatus};
use crate::domain::foundation::{OrderId, OrderNumber, Timestamp};

/// Provider-neutral request to open a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSessionRequest {
    pub order_id: OrderId,

    /// Passed to the provider as its reconciliation reference.
    pub order_number: OrderNumber,

    /// Major units, must be positive.
    pub amount: Decimal,

    /// Defaults to the merchant home currency when absent.
    pub currency: Option<Currency>,

    pub customer_email: String,
    pub customer_name: String,

    /// Where the provider sends the customer after paying.
    pub success_url: String,

    /// Where the provider sends the customer after aborting.
    pub cancel_url: String,
}

impl PaymentSessionRequest {
    /// Currency to charge, falling back to `default`.
    pub fn currency_or(&self, default: &Currency) -> Currency {
        self.currency.clone().unwrap_or_else(|| default.clone())
    }
}

/// A provider-hosted checkout context the customer is redirected to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub provider: PaymentProviderKind,

    /// Provider-assigned opaque id, unique within the provider.
    pub session_id: String,

    /// Absolute URL the customer is sent to.
    pub redirect_url: String,

    pub amount: Decimal,
    pub currency: Currency,

    /// Always present; synthesized when the provider reports none.
    pub expires_at: Timestamp,
}

impl PaymentSession {
    /// True once `now` has reached the session expiry.
    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        !now.is_before(&self.expires_at)
    }
}

/// A provider's current view of a transaction, fetched on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderTransactionStatus {
    pub provider: PaymentProviderKind,
    pub session_id: String,

    /// Status word exactly as the provider reported it.
    pub provider_status: String,

    /// Normalized status.
    pub status: PaymentStatus,

    pub payment_id: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
}
