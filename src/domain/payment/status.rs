//! Internal payment status and its lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// The single internal payment status vocabulary.
///
/// Every provider-specific status is normalized into one of these before
/// it touches an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Session created, customer has not finished paying.
    #[default]
    Pending,

    /// Authorized or otherwise in progress at the provider.
    Processing,

    /// Funds captured/settled.
    Paid,

    /// Declined or errored.
    Failed,

    /// Aborted by the customer or merchant.
    Cancelled,

    /// Session lapsed before completion.
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Expired => "expired",
        }
    }

    /// All statuses, in lifecycle order.
    pub fn all() -> [PaymentStatus; 6] {
        [
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
            PaymentStatus::Expired,
        ]
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Processing, Paid, Failed, Cancelled, Expired],
            Processing => vec![Paid, Failed, Cancelled, Expired],
            Paid | Failed | Cancelled | Expired => vec![],
        }
    }
}
