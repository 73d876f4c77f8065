//! HTTP handlers for payment endpoints.
//!
//! These handlers connect Axum routes to the checkout and reconciliation
//! command handlers and to the side-effect dispatcher.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::{
    CheckoutError, CreatePaymentSessionCommand, CreatePaymentSessionHandler, ReconcileError,
    ReconcileWebhookCommand, ReconcileWebhookHandler, SideEffectDispatcher,
};
use crate::domain::dispatch::IdempotencyKey;
use crate::domain::foundation::OrderId;
use crate::domain::payment::PaymentProviderKind;

use super::dto::{
    CreateSessionRequest, CreateSessionResponse, ErrorResponse, RetryResponse, WebhookAck,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
#[derive(Clone)]
pub struct PaymentsAppState {
    pub checkout: Arc<CreatePaymentSessionHandler>,
    pub reconcile: Arc<ReconcileWebhookHandler>,
    pub dispatcher: SideEffectDispatcher,
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payments/:provider/session - Open a checkout session
pub async fn create_session(
    State(state): State<PaymentsAppState>,
    Path(provider): Path<String>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, PaymentsApiError> {
    let provider: PaymentProviderKind = provider.parse().map_err(|_| {
        PaymentsApiError::request(
            StatusCode::NOT_FOUND,
            "PROVIDER_NOT_FOUND",
            format!("Unknown payment provider '{}'", provider),
        )
    })?;

    let order_id = request
        .order_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| PaymentsApiError::validation("Order ID is required"))?;
    let order_id: OrderId = order_id
        .trim()
        .parse()
        .map_err(|_| PaymentsApiError::validation("Order ID is not a valid id"))?;

    let session = state
        .checkout
        .handle(CreatePaymentSessionCommand { order_id, provider })
        .await?;

    Ok(Json(CreateSessionResponse::from(session)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/stripe - Handle Stripe webhooks
pub async fn stripe_webhook(
    State(state): State<PaymentsAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, PaymentsApiError> {
    let signature = first_header(&headers, &["Stripe-Signature"]);
    receive_webhook(&state, PaymentProviderKind::Stripe, signature, body).await
}

/// POST /api/webhooks/datatrans - Handle Datatrans webhooks
pub async fn datatrans_webhook(
    State(state): State<PaymentsAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, PaymentsApiError> {
    let signature = first_header(&headers, &["Datatrans-Signature", "x-datatrans-signature"]);
    receive_webhook(&state, PaymentProviderKind::Datatrans, signature, body).await
}

/// Authenticated deliveries are acknowledged with 200 whatever they did,
/// so providers stop redelivering. Storage failures answer 500 to get a
/// redelivery.
async fn receive_webhook(
    state: &PaymentsAppState,
    provider: PaymentProviderKind,
    signature: Option<String>,
    body: Bytes,
) -> Result<Json<WebhookAck>, PaymentsApiError> {
    let cmd = ReconcileWebhookCommand {
        provider,
        payload: body.to_vec(),
        signature,
    };

    match state.reconcile.handle(cmd).await {
        Ok(outcome) => Ok(Json(WebhookAck::from(&outcome))),
        Err(ReconcileError::InvalidPayload(err)) => {
            tracing::warn!(provider = %provider, error = %err, "Webhook payload ignored");
            Ok(Json(WebhookAck::new("ignored")))
        }
        Err(err) => Err(err.into()),
    }
}

fn first_header(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

// ════════════════════════════════════════════════════════════════════════════════
// Operations
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/ops/side-effects - Side-effect queue snapshot
pub async fn side_effect_status(State(state): State<PaymentsAppState>) -> impl IntoResponse {
    Json(state.dispatcher.queue_status().await)
}

/// POST /api/ops/side-effects/:key/retry - Re-arm a failed side effect
pub async fn retry_side_effect(
    State(state): State<PaymentsAppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, PaymentsApiError> {
    let key: IdempotencyKey = key
        .parse()
        .map_err(|err: crate::domain::foundation::ValidationError| {
            PaymentsApiError::validation(err.to_string())
        })?;

    if !state.dispatcher.retry_failed(&key).await {
        return Err(PaymentsApiError::request(
            StatusCode::NOT_FOUND,
            "SIDE_EFFECT_NOT_FAILED",
            format!("No failed side effect with key {}", key),
        ));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(RetryResponse {
            idempotency_key: key.to_string(),
            rearmed: true,
        }),
    ))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts application errors to HTTP responses.
#[derive(Debug)]
pub enum PaymentsApiError {
    Checkout(CheckoutError),
    Reconcile(ReconcileError),
    Request {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl PaymentsApiError {
    fn request(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            code,
            message: message.into(),
        }
    }

    fn validation(message: impl Into<String>) -> Self {
        Self::request(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
    }
}

impl From<CheckoutError> for PaymentsApiError {
    fn from(err: CheckoutError) -> Self {
        Self::Checkout(err)
    }
}

impl From<ReconcileError> for PaymentsApiError {
    fn from(err: ReconcileError) -> Self {
        Self::Reconcile(err)
    }
}

impl IntoResponse for PaymentsApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            PaymentsApiError::Checkout(err) => match &err {
                CheckoutError::OrderNotFound(_) => (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new("ORDER_NOT_FOUND", err.to_string()),
                ),
                CheckoutError::NotPayable { .. } => (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("ORDER_NOT_PAYABLE", err.to_string()),
                ),
                CheckoutError::ProviderUnavailable(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("PROVIDER_UNAVAILABLE", err.to_string()),
                ),
                CheckoutError::Payment(payment) => {
                    tracing::warn!(error = %payment, "Checkout session creation failed");
                    (StatusCode::BAD_REQUEST, ErrorResponse::from(payment))
                }
                CheckoutError::Repository(domain) => {
                    tracing::error!(error = %domain, "Order storage failed during checkout");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::new("INTERNAL_ERROR", "Failed to create payment session"),
                    )
                }
            },
            PaymentsApiError::Reconcile(err) => match &err {
                ReconcileError::Unauthenticated => (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::new("INVALID_WEBHOOK_SIGNATURE", err.to_string()),
                ),
                ReconcileError::ProviderUnavailable(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("PROVIDER_UNAVAILABLE", err.to_string()),
                ),
                ReconcileError::InvalidPayload(payment) => {
                    (StatusCode::BAD_REQUEST, ErrorResponse::from(payment))
                }
                ReconcileError::Repository(domain) => {
                    tracing::error!(error = %domain, "Order storage failed during reconciliation");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::new("INTERNAL_ERROR", "Webhook processing failed"),
                    )
                }
            },
            PaymentsApiError::Request {
                status,
                code,
                message,
            } => (status, ErrorResponse::new(code, message)),
        };

        (status, Json(body)).into_response()
    }
}
