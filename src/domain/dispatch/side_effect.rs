//! Side effects triggered by a settled payment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{OrderId, ValidationError};

/// The effects a newly paid order triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectKind {
    /// Order confirmation to the customer.
    CustomerConfirmation,

    /// New-order mail to the fulfillment partner.
    FulfillmentNotification,

    /// Posting the order to the accounting system.
    LedgerSync,
}

impl SideEffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SideEffectKind::CustomerConfirmation => "customer_confirmation",
            SideEffectKind::FulfillmentNotification => "fulfillment_notification",
            SideEffectKind::LedgerSync => "ledger_sync",
        }
    }
}

impl fmt::Display for SideEffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deterministic key that collapses redelivered work onto one queue entry.
///
/// Always `<order_id>:<kind>`; never time- or random-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn for_effect(order_id: &OrderId, kind: SideEffectKind) -> Self {
        Self(format!("{}:{}", order_id, kind.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for IdempotencyKey {
    type Err = ValidationError;

    /// Parses `"<order_id>:<kind>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || ValidationError::invalid_format("idempotency_key", "expected <order_id>:<kind>");
        let (order_id, kind) = s.split_once(':').ok_or_else(invalid)?;
        let order_id: OrderId = order_id.parse().map_err(|_| invalid())?;
        let kind = [
            SideEffectKind::CustomerConfirmation,
            SideEffectKind::FulfillmentNotification,
            SideEffectKind::LedgerSync,
        ]
        .into_iter()
        .find(|k| k.as_str() == kind)
        .ok_or_else(invalid)?;
        Ok(Self::for_effect(&order_id, kind))
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rendered e-mail, ready for a sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

/// What an effect does when executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffectPayload {
    Email(EmailMessage),
    LedgerSync { order_id: OrderId },
}

/// One unit of post-payment work for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEffect {
    pub order_id: OrderId,
    pub kind: SideEffectKind,
    pub payload: SideEffectPayload,
}

impl SideEffect {
    pub fn customer_confirmation(order_id: OrderId, email: EmailMessage) -> Self {
        Self {
            order_id,
            kind: SideEffectKind::CustomerConfirmation,
            payload: SideEffectPayload::Email(email),
        }
    }

    pub fn fulfillment_notification(order_id: OrderId, email: EmailMessage) -> Self {
        Self {
            order_id,
            kind: SideEffectKind::FulfillmentNotification,
            payload: SideEffectPayload::Email(email),
        }
    }

    pub fn ledger_sync(order_id: OrderId) -> Self {
        Self {
            order_id,
            kind: SideEffectKind::LedgerSync,
            payload: SideEffectPayload::LedgerSync { order_id },
        }
    }

    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey::for_effect(&self.order_id, self.kind)
    }
}
