//! Post-payment side effects and their retry queue entries.

mod queue;
mod side_effect;
pub mod templates;

pub use queue::{
    retry_delay, AttemptRecord, QueueEntryState, QueueStatus, QueuedSideEffect, RetryDecision,
};
pub use side_effect::{EmailMessage, IdempotencyKey, SideEffect, SideEffectKind, SideEffectPayload};
