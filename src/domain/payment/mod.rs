//! Payment domain - provider-neutral payment vocabulary.
//!
//! - `money` - decimal amounts and the minor-unit boundary
//! - `status` / `transition` - the payment state machine
//! - `normalizer` - provider status tables
//! - `session` / `event` - checkout sessions and normalized webhook events
//! - `errors` - discriminable provider errors

mod errors;
mod event;
mod money;
pub mod normalizer;
mod provider;
mod session;
mod status;
mod transition;

pub use errors::{PaymentError, PaymentErrorCode};
pub use event::{PaymentEventRecord, PaymentWebhookEvent};
pub use money::{Currency, Money};
pub use normalizer::normalize;
pub use provider::PaymentProviderKind;
pub use session::{PaymentSession, PaymentSessionRequest, ProviderTransactionStatus};
pub use status::PaymentStatus;
pub use transition::PaymentTransition;
