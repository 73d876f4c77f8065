//! Mock payment provider for testing.
//!
//! Provides a configurable mock implementation of `PaymentProvider` for unit
//! and integration tests. Supports:
//! - Pre-configured sessions and transaction statuses
//! - Error injection
//! - Call tracking
//! - Webhook verification modes

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::foundation::Timestamp;
use crate::domain::payment::{
    Currency, PaymentError, PaymentProviderKind, PaymentSession, PaymentSessionRequest,
    PaymentWebhookEvent, ProviderTransactionStatus,
};
use crate::ports::PaymentProvider;

/// Mock payment provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentProvider::new(PaymentProviderKind::Datatrans);
///
/// // Inject errors
/// mock.set_method_error("create_session", PaymentError::network("down"));
///
/// // Callbacks are parsed as serialized `PaymentWebhookEvent`s
/// let event = mock.parse_callback(&serde_json::to_vec(&event)?)?;
/// ```
#[derive(Clone)]
pub struct MockPaymentProvider {
    kind: PaymentProviderKind,

    /// Inner state (thread-safe for async tests).
    inner: Arc<Mutex<MockState>>,
}

/// Internal mutable state.
#[derive(Default)]
struct MockState {
    /// Next session to return from `create_session`.
    next_session: Option<PaymentSession>,

    /// Sessions handed out so far.
    sessions_created: u32,

    /// Transaction statuses by session id.
    statuses: HashMap<String, ProviderTransactionStatus>,

    /// Error to return on next call.
    next_error: Option<PaymentError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,

    /// Webhook verification behavior.
    webhook_verify_mode: WebhookVerifyMode,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

/// How to handle webhook verification.
#[derive(Default, Clone)]
enum WebhookVerifyMode {
    /// Accept any payload.
    #[default]
    AcceptAll,

    /// Require an exact signature header.
    RequireSignature(String),

    /// Always fail verification.
    AlwaysFail,
}

impl MockPaymentProvider {
    /// Create a new mock posing as `kind`.
    pub fn new(kind: PaymentProviderKind) -> Self {
        Self {
            kind,
            inner: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Create a mock that fails all webhook verifications.
    pub fn rejecting_webhooks(kind: PaymentProviderKind) -> Self {
        let mock = Self::new(kind);
        mock.state().webhook_verify_mode = WebhookVerifyMode::AlwaysFail;
        mock
    }

    /// Create a mock that only accepts one exact signature header.
    pub fn requiring_signature(kind: PaymentProviderKind, signature: impl Into<String>) -> Self {
        let mock = Self::new(kind);
        mock.state().webhook_verify_mode = WebhookVerifyMode::RequireSignature(signature.into());
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Set the session to return on next `create_session` call.
    pub fn set_session(&self, session: PaymentSession) {
        self.state().next_session = Some(session);
    }

    /// Set the status returned by `transaction_status` for a session.
    pub fn set_transaction_status(&self, status: ProviderTransactionStatus) {
        let id = status.session_id.clone();
        self.state().statuses.insert(id, status);
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        let mut state = self.state();

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        // Global error is consumed
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    fn kind(&self) -> PaymentProviderKind {
        self.kind
    }

    async fn create_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<PaymentSession, PaymentError> {
        self.record_call(
            "create_session",
            vec![request.order_id.to_string(), request.order_number.to_string()],
        );
        self.check_error("create_session")?;

        let mut state = self.state();
        state.sessions_created += 1;
        if let Some(session) = state.next_session.take() {
            return Ok(session);
        }

        let session_id = format!("mock_{}_{}", self.kind, state.sessions_created);
        Ok(PaymentSession {
            provider: self.kind,
            redirect_url: format!("https://pay.mock.test/{}", session_id),
            session_id,
            amount: request.amount,
            currency: request.currency.unwrap_or_else(Currency::chf),
            expires_at: Timestamp::now().add_minutes(30),
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature_header: Option<&str>) -> bool {
        self.record_call(
            "verify_webhook",
            vec![
                String::from_utf8_lossy(payload).chars().take(50).collect(),
                signature_header.unwrap_or_default().to_string(),
            ],
        );

        match &self.state().webhook_verify_mode {
            WebhookVerifyMode::AcceptAll => true,
            WebhookVerifyMode::RequireSignature(required) => {
                signature_header == Some(required.as_str())
            }
            WebhookVerifyMode::AlwaysFail => false,
        }
    }

    fn parse_callback(&self, raw_payload: &[u8]) -> Result<PaymentWebhookEvent, PaymentError> {
        self.record_call("parse_callback", vec![]);
        self.check_error("parse_callback")?;

        serde_json::from_slice(raw_payload)
            .map_err(|e| PaymentError::invalid_webhook(e.to_string()).with_provider(self.kind))
    }

    async fn transaction_status(
        &self,
        session_id: &str,
    ) -> Result<ProviderTransactionStatus, PaymentError> {
        self.record_call("transaction_status", vec![session_id.to_string()]);
        self.check_error("transaction_status")?;

        self.state()
            .statuses
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("Transaction").with_provider(self.kind))
    }

    async fn cancel_session(&self, session_id: &str) -> Result<(), PaymentError> {
        self.record_call("cancel_session", vec![session_id.to_string()]);
        self.check_error("cancel_session")
    }
}
