//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, the state machine trait and error types
//! used by the payment, order and dispatch domains.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{OrderId, OrderNumber};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
