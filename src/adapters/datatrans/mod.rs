//! Datatrans payment provider adapter.
//!
//! - Transaction initialization with redirect to the Datatrans payment page
//! - Structured and legacy callback parsing
//! - Multi-scheme callback signature verification

mod callback_types;
mod datatrans_adapter;
mod signature;

pub use callback_types::{DatatransCallback, LegacyCallback, StructuredTransaction};
pub use datatrans_adapter::{DatatransConfig, DatatransPaymentAdapter};
pub use signature::DatatransSignatureVerifier;
