//! Infoniqa ONE accounting-system adapter.

mod infoniqa_adapter;
mod token_cache;

pub use infoniqa_adapter::{InfoniqaConfig, InfoniqaLedgerAdapter};
pub use token_cache::{CachedAccessToken, TokenCache};
