//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid bind address {0}")]
    InvalidBindAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Outbound timeout {outbound_secs}s for {section} must be shorter than the request timeout {request_secs}s")]
    OutboundTimeoutTooLong {
        section: &'static str,
        outbound_secs: u64,
        request_secs: u64,
    },

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Invalid URL for {0}")]
    InvalidUrl(&'static str),

    #[error("Session expiry must be between 1 and 1440 minutes")]
    InvalidSessionExpiry,

    #[error("Invalid Stripe API key format")]
    InvalidStripeKey,

    #[error("Invalid Stripe webhook secret format")]
    InvalidStripeWebhookSecret,

    #[error("Invalid Resend API key format")]
    InvalidResendKey,

    #[error("Invalid e-mail address for {0}")]
    InvalidEmail(&'static str),

    #[error("Dispatch max_attempts must be between 1 and 10")]
    InvalidMaxAttempts,

    #[error("Dispatch delivered_capacity must be at least 1")]
    InvalidDeliveredCapacity,
}
