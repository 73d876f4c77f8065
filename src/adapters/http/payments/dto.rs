//! HTTP DTOs (Data Transfer Objects) for payment endpoints.
//!
//! These types define the JSON request/response structure for the payments API.
//! They serve as the boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::application::ReconcileOutcome;
use crate::domain::payment::{PaymentError, PaymentSession};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to open a checkout session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Missing ids are answered with a validation error, not a 422.
    #[serde(default)]
    pub order_id: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Checkout session handed to the storefront.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub redirect_url: String,
    /// ISO 8601.
    pub expires_at: String,
}

impl From<PaymentSession> for CreateSessionResponse {
    fn from(session: PaymentSession) -> Self {
        Self {
            session_id: session.session_id,
            redirect_url: session.redirect_url,
            expires_at: session.expires_at.to_string(),
        }
    }
}

/// Acknowledgement returned to the provider for every accepted webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: String,
}

impl WebhookAck {
    pub fn new(outcome: impl Into<String>) -> Self {
        Self {
            received: true,
            outcome: outcome.into(),
        }
    }
}

impl From<&ReconcileOutcome> for WebhookAck {
    fn from(outcome: &ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Applied { .. } => Self::new("applied"),
            ReconcileOutcome::NoOp { reason, .. } => Self::new(*reason),
            ReconcileOutcome::OrderNotFound { .. } => Self::new("order_not_found"),
        }
    }
}

/// Result of an operator retry request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryResponse {
    pub idempotency_key: String,
    pub rearmed: bool,
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Provider that produced the error, for payment errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Provider-specific details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            provider: None,
            details: None,
        }
    }
}

impl From<&PaymentError> for ErrorResponse {
    fn from(err: &PaymentError) -> Self {
        let mut details = err.details.clone();
        if let Some(code) = &err.provider_code {
            details.insert("providerCode".to_string(), Value::String(code.clone()));
        }
        Self {
            code: err.code.to_string().to_uppercase(),
            message: err.message.clone(),
            provider: err.provider.map(|p| p.to_string()),
            details: Some(details),
        }
    }
}
