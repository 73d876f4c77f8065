//! Payment provider errors.
//!
//! Callers must be able to tell "not configured" (alert, never retry),
//! "provider said no" (surface, never blindly retry) and "provider answered
//! nonsense" apart, so the error carries a stable code plus the provider's
//! own details.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::PaymentProviderKind;
use crate::domain::foundation::ValidationError;

/// Errors from payment provider operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider that produced the error, if any.
    pub provider: Option<PaymentProviderKind>,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Provider-specific details (status code, response body fields).
    #[serde(default)]
    pub details: Map<String, Value>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            provider_code: None,
            details: Map::new(),
            retryable: code.is_retryable(),
        }
    }

    /// Tag the error with the provider that raised it.
    pub fn with_provider(mut self, provider: PaymentProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Create with provider code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Attach a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Credentials for the provider are missing.
    pub fn not_configured(provider: PaymentProviderKind, missing: &str) -> Self {
        Self::new(
            PaymentErrorCode::NotConfigured,
            format!("{} is not configured: missing {}", provider, missing),
        )
        .with_provider(provider)
    }

    /// The request was rejected before reaching the provider.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidRequest, message)
    }

    /// The provider answered with a 4xx/5xx.
    pub fn provider_rejected(provider: PaymentProviderKind, status: u16, message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderRejected, message)
            .with_provider(provider)
            .with_detail("status", status)
    }

    /// The provider answered 2xx but the body is not usable.
    pub fn invalid_response(provider: PaymentProviderKind, message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidResponse, message).with_provider(provider)
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// The provider did not answer within the configured timeout.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::Timeout, message)
    }

    /// Maps a transport failure, keeping timeouts distinct.
    pub fn transport(provider: PaymentProviderKind, timed_out: bool, message: impl Into<String>) -> Self {
        let err = if timed_out {
            Self::timeout(message)
        } else {
            Self::network(message)
        };
        err.with_provider(provider)
    }

    /// Create an invalid webhook error.
    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidWebhook, message)
    }

    /// Create a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.provider {
            Some(provider) => write!(f, "{} ({}): {}", self.code, provider, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for PaymentError {}

impl From<ValidationError> for PaymentError {
    fn from(err: ValidationError) -> Self {
        PaymentError::invalid_request(err.to_string())
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Credentials missing from configuration.
    NotConfigured,

    /// Request failed local validation (non-positive amount, bad currency).
    InvalidRequest,

    /// Provider answered with an error status.
    ProviderRejected,

    /// Provider answered 2xx without the expected identifiers.
    InvalidResponse,

    /// Network connectivity issue.
    NetworkError,

    /// Provider call exceeded its timeout.
    Timeout,

    /// Webhook payload could not be authenticated or parsed.
    InvalidWebhook,

    /// Resource not found.
    NotFound,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentErrorCode::NetworkError | PaymentErrorCode::Timeout)
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NotConfigured => "not_configured",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::ProviderRejected => "provider_rejected",
            PaymentErrorCode::InvalidResponse => "invalid_response",
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::Timeout => "timeout",
            PaymentErrorCode::InvalidWebhook => "invalid_webhook",
            PaymentErrorCode::NotFound => "not_found",
        };
        write!(f, "{}", s)
    }
}
