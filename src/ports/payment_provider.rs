//! Payment provider port for external payment processing.
//!
//! One implementation per integrated provider (Stripe, Datatrans). The
//! provider in use is picked by static configuration; there is no runtime
//! registry.
//!
//! # Design
//!
//! - **Stateless**: adapters perform the outbound call and nothing else
//! - **Dual-format callbacks**: each adapter absorbs its provider's payload
//!   variants and returns one normalized event
//! - **Never-throwing verification**: authenticity is a boolean

use async_trait::async_trait;

use crate::domain::payment::{
    PaymentError, PaymentProviderKind, PaymentSession, PaymentSessionRequest, PaymentWebhookEvent,
    ProviderTransactionStatus,
};

/// Port for payment provider integrations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Which provider this adapter talks to.
    fn kind(&self) -> PaymentProviderKind;

    /// Open a checkout session for an order.
    ///
    /// Fails with `NotConfigured` before any network call when credentials
    /// are missing, `ProviderRejected` on a 4xx/5xx and `InvalidResponse`
    /// when a 2xx body lacks the session identifier.
    async fn create_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<PaymentSession, PaymentError>;

    /// Check a webhook's authenticity.
    ///
    /// Returns `true` without checking when no secret is configured.
    fn verify_webhook(&self, payload: &[u8], signature_header: Option<&str>) -> bool;

    /// Translate a verified webhook payload into a normalized event.
    fn parse_callback(&self, raw_payload: &[u8]) -> Result<PaymentWebhookEvent, PaymentError>;

    /// Fetch the provider's current view of a session/transaction.
    async fn transaction_status(
        &self,
        session_id: &str,
    ) -> Result<ProviderTransactionStatus, PaymentError>;

    /// Cancel an open session. Sessions that already finished count as cancelled.
    async fn cancel_session(&self, session_id: &str) -> Result<(), PaymentError>;
}
