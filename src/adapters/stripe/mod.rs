//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port for Stripe Checkout, including:
//! - Checkout session creation, lookup and expiry
//! - Webhook signature verification
//! - Event parsing into normalized payment events
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated to prevent replay attacks (5-minute window)
//! - All secrets are handled via `secrecy::SecretString`
//!
//! # Configuration
//!
//! Environment variables (all optional, checked at first use):
//! - `STOREFRONT__PAYMENT__STRIPE__SECRET_KEY`: Stripe secret API key
//! - `STOREFRONT__PAYMENT__STRIPE__WEBHOOK_SECRET`: Webhook signing secret (whsec_...)

mod stripe_adapter;
mod webhook_types;

pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
pub use webhook_types::{
    hex_decode, hex_encode, SignatureHeader, SignatureParseError, StripeCheckoutSession,
    StripePaymentIntent, StripeWebhookEvent,
};
