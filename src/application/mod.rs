//! Application layer - Commands, Handlers and the side-effect dispatcher.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//!
//! - `checkout` - open (or reuse) a provider checkout session for an order
//! - `reconcile` - apply a provider callback to its order
//! - `dispatcher` - run post-payment side effects once, with bounded retry
//! - `post_payment` - what those side effects are and how one attempt runs

mod checkout;
mod dispatcher;
mod post_payment;
mod providers;
mod reconcile;

pub use checkout::{CheckoutError, CreatePaymentSessionCommand, CreatePaymentSessionHandler};
pub use dispatcher::{DispatcherConfig, SideEffectDispatcher};
pub use post_payment::{PostPaymentExecutor, PostPaymentSettings};
pub use providers::PaymentProviders;
pub use reconcile::{
    ReconcileError, ReconcileOutcome, ReconcileWebhookCommand, ReconcileWebhookHandler,
};
