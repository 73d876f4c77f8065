//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `stripe` / `datatrans` - Payment providers
//! - `infoniqa` - Accounting ledger
//! - `notification` - Transactional e-mail (Resend, logging)
//! - `memory` - In-process order store and provider double
//! - `http` - Axum routes

pub mod datatrans;
pub mod http;
pub mod infoniqa;
pub mod memory;
pub mod notification;
pub mod stripe;

pub use datatrans::{DatatransConfig, DatatransPaymentAdapter};
pub use infoniqa::{InfoniqaConfig, InfoniqaLedgerAdapter};
pub use memory::InMemoryOrderRepository;
pub use notification::{LoggingNotificationSender, ResendNotificationSender};
pub use stripe::{StripeConfig, StripePaymentAdapter};
