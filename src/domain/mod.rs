//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, state machine, errors)
//! - `payment` - Provider-neutral payment vocabulary and state machine
//! - `order` - The slice of the storefront order that payments touch
//! - `dispatch` - Post-payment side effects and retry queue entries

pub mod dispatch;
pub mod foundation;
pub mod order;
pub mod payment;
