//! Transition evaluation for incoming provider statuses.
//!
//! Webhooks arrive duplicated and out of order. The order's stored status is
//! only moved along edges the state machine allows; everything else is
//! classified so the caller can log it and acknowledge the delivery.

use serde::{Deserialize, Serialize};

use super::PaymentStatus;
use crate::domain::foundation::StateMachine;

/// Result of comparing a stored status with an incoming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentTransition {
    /// The order moves from `from` to `to`.
    Applied {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Incoming status equals the stored one (redelivery).
    Duplicate,

    /// Stored status is terminal; incoming status is ignored.
    TerminalNoOp,

    /// Incoming status is behind the stored one (late delivery).
    Stale,
}

impl PaymentTransition {
    /// Classifies `incoming` against `current`.
    pub fn evaluate(current: PaymentStatus, incoming: PaymentStatus) -> Self {
        if current == incoming {
            return PaymentTransition::Duplicate;
        }
        if current.is_terminal() {
            return PaymentTransition::TerminalNoOp;
        }
        if current.can_transition_to(&incoming) {
            return PaymentTransition::Applied {
                from: current,
                to: incoming,
            };
        }
        PaymentTransition::Stale
    }

    /// True only when this transition moves the order into `paid`.
    pub fn entered_paid(&self) -> bool {
        matches!(
            self,
            PaymentTransition::Applied {
                to: PaymentStatus::Paid,
                ..
            }
        )
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, PaymentTransition::Applied { .. })
    }

    /// Short label for logs and the audit trail.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentTransition::Applied { .. } => "applied",
            PaymentTransition::Duplicate => "duplicate",
            PaymentTransition::TerminalNoOp => "terminal_no_op",
            PaymentTransition::Stale => "stale",
        }
    }
}
