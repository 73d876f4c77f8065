//! In-process adapters: the order repository used for local runs and the
//! configurable payment provider double used by tests.

mod in_memory_order_repository;
mod mock_payment_provider;

pub use in_memory_order_repository::InMemoryOrderRepository;
pub use mock_payment_provider::{MethodCall, MockPaymentProvider};
