//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `PaymentProvider` - Stripe / Datatrans checkout and callbacks
//! - `NotificationSender` - Transactional e-mail
//! - `LedgerSync` - Accounting-system sync
//! - `OrderRepository` - Order reads and compare-and-set payment writes
//! - `SideEffectExecutor` - One attempt of a post-payment side effect

mod ledger_sync;
mod notification_sender;
mod order_repository;
mod payment_provider;
mod side_effect_executor;

pub use ledger_sync::{LedgerError, LedgerSync, LedgerSyncReceipt, LedgerTransactionStatus};
pub use notification_sender::{NotificationError, NotificationSender};
pub use order_repository::OrderRepository;
pub use payment_provider::PaymentProvider;
pub use side_effect_executor::{SideEffectError, SideEffectExecutor};
