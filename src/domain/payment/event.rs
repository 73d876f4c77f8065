//! Normalized webhook events and the payment audit trail.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Currency, PaymentProviderKind, PaymentStatus};
use crate::domain::foundation::{OrderId, Timestamp};

/// A provider callback translated into internal vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentWebhookEvent {
    pub provider: PaymentProviderKind,

    /// Provider-native event name, kept for the audit trail.
    pub event_type: String,

    pub session_id: Option<String>,

    /// Provider charge/authorization identifier.
    pub payment_id: Option<String>,

    /// Normalized status.
    pub status: PaymentStatus,

    /// Major units.
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,

    /// Opaque key/value bag echoed by the provider.
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Verbatim payload for forensic replay.
    pub raw_payload: String,
}

impl PaymentWebhookEvent {
    /// Order id echoed through provider metadata.
    pub fn order_id_hint(&self) -> Option<OrderId> {
        self.metadata.get("order_id").and_then(|v| v.parse().ok())
    }

    /// Order number echoed as metadata or as the provider's reference.
    pub fn order_number_hint(&self) -> Option<&str> {
        self.metadata
            .get("order_number")
            .or_else(|| self.metadata.get("refno"))
            .map(String::as_str)
    }

    /// Best identifier to correlate log lines for this delivery.
    pub fn correlation_id(&self) -> String {
        self.session_id
            .clone()
            .or_else(|| self.payment_id.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// One processed webhook delivery, as stored for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEventRecord {
    pub order_id: OrderId,
    pub provider: PaymentProviderKind,
    pub event_type: String,
    pub status_before: PaymentStatus,
    pub status_after: PaymentStatus,

    /// Transition label (`applied`, `duplicate`, `stale`, ...).
    pub outcome: String,

    pub correlation_id: String,
    pub recorded_at: Timestamp,
}
