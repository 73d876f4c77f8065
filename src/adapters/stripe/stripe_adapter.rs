//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port on top of Stripe Checkout.
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secrets handled via `secrecy::SecretString`
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new()
//!     .with_secret_key("sk_test_...")
//!     .with_webhook_secret("whsec_...");
//! let adapter = StripePaymentAdapter::new(config);
//! ```

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;

use crate::domain::foundation::{StateMachine, Timestamp};
use crate::domain::payment::{
    normalize, Currency, Money, PaymentError, PaymentProviderKind, PaymentSession,
    PaymentSessionRequest, PaymentStatus, PaymentWebhookEvent, ProviderTransactionStatus,
};
use crate::ports::PaymentProvider;

use super::webhook_types::{
    hex_encode, SignatureHeader, StripeApiError, StripeCheckoutSession, StripeEventObject,
    StripeWebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

const PROVIDER: PaymentProviderKind = PaymentProviderKind::Stripe;

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    secret_key: Option<SecretString>,

    /// Webhook signing secret (whsec_...).
    webhook_secret: Option<SecretString>,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Currency used when a request carries none.
    default_currency: Currency,

    /// Expiry requested for new sessions.
    session_expiry: Duration,

    /// Per-request timeout.
    timeout: Duration,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            api_base_url: "https://api.stripe.com".to_string(),
            default_currency: Currency::chf(),
            session_expiry: Duration::from_secs(30 * 60),
            timeout: Duration::from_secs(10),
        }
    }
}

impl StripeConfig {
    /// Create an unconfigured Stripe configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
        self.secret_key = Some(SecretString::new(key.into()));
        self
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(SecretString::new(secret.into()));
        self
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_currency(mut self, currency: Currency) -> Self {
        self.default_currency = currency;
        self
    }

    pub fn with_session_expiry(mut self, expiry: Duration) -> Self {
        self.session_expiry = expiry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn secret_key(&self) -> Result<&SecretString, PaymentError> {
        self.config
            .secret_key
            .as_ref()
            .ok_or_else(|| PaymentError::not_configured(PROVIDER, "secret_key"))
    }

    /// Verify webhook signature using HMAC-SHA256.
    ///
    /// # Security
    ///
    /// - Uses constant-time comparison to prevent timing attacks
    /// - Validates timestamp to prevent replay attacks
    fn verify_signature(
        &self,
        secret: &SecretString,
        payload: &[u8],
        header: &SignatureHeader,
        now: i64,
    ) -> Result<(), PaymentError> {
        // 1. Validate timestamp (prevent replay attacks)
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(PaymentError::invalid_webhook(format!(
                "Event too old ({} seconds)",
                age
            )));
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(PaymentError::invalid_webhook("Event timestamp in future"));
        }

        // 2. Compute expected signature over "<t>.<payload>"
        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| PaymentError::invalid_webhook(e.to_string()))?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        // 3. Constant-time comparison against every v1 entry
        let expected_bytes: &[u8] = expected.as_slice();
        let matched = header
            .v1_signatures
            .iter()
            .any(|provided| expected_bytes.ct_eq(provided.as_slice()).unwrap_u8() == 1);

        if !matched {
            tracing::warn!(
                expected_prefix = %hex_encode(&expected_bytes[..4]),
                "Invalid webhook signature"
            );
            return Err(PaymentError::invalid_webhook("Invalid signature"));
        }

        Ok(())
    }

    /// Translate an API error response into a `ProviderRejected` error.
    async fn rejection(response: reqwest::Response, operation: &str) -> PaymentError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status, operation, body = %body, "Stripe API request rejected");

        match serde_json::from_str::<StripeApiError>(&body) {
            Ok(api_error) => {
                let message = api_error
                    .error
                    .message
                    .unwrap_or_else(|| format!("Stripe {} failed", operation));
                let mut err = PaymentError::provider_rejected(PROVIDER, status, message);
                if let Some(code) = api_error.error.code {
                    err = err.with_provider_code(code);
                }
                if let Some(error_type) = api_error.error.error_type {
                    err = err.with_detail("type", error_type);
                }
                err
            }
            Err(_) => PaymentError::provider_rejected(
                PROVIDER,
                status,
                format!("Stripe {} failed with status {}", operation, status),
            )
            .with_detail("body", body),
        }
    }

    fn transport_error(e: reqwest::Error) -> PaymentError {
        PaymentError::transport(PROVIDER, e.is_timeout(), e.to_string())
    }

    /// Status word of a checkout session, giving expiry precedence.
    fn session_status_word(session: &StripeCheckoutSession) -> &str {
        if session.status.as_deref() == Some("expired") {
            return "expired";
        }
        session.payment_status.as_deref().unwrap_or("unpaid")
    }

    fn minor_to_major(minor: Option<i64>, currency: Option<&Currency>) -> Option<rust_decimal::Decimal> {
        let currency = currency.cloned().unwrap_or_default();
        minor.and_then(|m| Money::from_minor_units(m, currency).ok().map(|money| money.amount()))
    }

    fn parse_currency(raw: Option<&str>) -> Option<Currency> {
        raw.and_then(|c| Currency::new(c).ok())
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    fn kind(&self) -> PaymentProviderKind {
        PROVIDER
    }

    async fn create_session(
        &self,
        request: PaymentSessionRequest,
    ) -> Result<PaymentSession, PaymentError> {
        let secret_key = self.secret_key()?;
        let currency = request.currency_or(&self.config.default_currency);
        let money = Money::new(request.amount, currency)?;
        let unit_amount = money.to_minor_units()?;

        let requested_expiry = Timestamp::now().add_std(self.config.session_expiry);
        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);

        let params = vec![
            ("mode", "payment".to_string()),
            ("locale", "de".to_string()),
            ("customer_email", request.customer_email.clone()),
            ("client_reference_id", request.order_id.to_string()),
            (
                "line_items[0][price_data][currency]",
                money.currency().as_str().to_ascii_lowercase(),
            ),
            ("line_items[0][price_data][unit_amount]", unit_amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]",
                format!("Bestellung {}", request.order_number),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("expires_at", requested_expiry.unix_secs().to_string()),
            ("metadata[order_id]", request.order_id.to_string()),
            ("metadata[order_number]", request.order_number.to_string()),
            (
                "payment_intent_data[metadata][order_id]",
                request.order_id.to_string(),
            ),
            (
                "payment_intent_data[metadata][order_number]",
                request.order_number.to_string(),
            ),
        ];

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(secret_key.expose_secret())
            .timeout(self.config.timeout)
            .form(&params)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::rejection(response, "create_session").await);
        }

        let session: StripeCheckoutSession = response.json().await.map_err(|e| {
            PaymentError::invalid_response(PROVIDER, format!("Failed to parse Stripe response: {}", e))
        })?;

        let redirect_url = session
            .url
            .as_deref()
            .filter(|u| url::Url::parse(u).is_ok())
            .ok_or_else(|| {
                PaymentError::invalid_response(PROVIDER, "Checkout session has no usable url")
                    .with_detail("session_id", session.id.clone())
            })?
            .to_string();

        let expires_at = session
            .expires_at
            .and_then(Timestamp::from_unix_secs)
            .unwrap_or(requested_expiry);

        tracing::info!(
            order_id = %request.order_id,
            order_number = %request.order_number,
            session_id = %session.id,
            "Stripe checkout session created"
        );

        Ok(PaymentSession {
            provider: PROVIDER,
            session_id: session.id,
            redirect_url,
            amount: money.amount(),
            currency: money.currency().clone(),
            expires_at,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature_header: Option<&str>) -> bool {
        let Some(secret) = self.config.webhook_secret.as_ref() else {
            tracing::warn!(
                provider = %PROVIDER,
                "Webhook secret not configured - accepting webhook WITHOUT verification"
            );
            return true;
        };

        let Some(raw_header) = signature_header else {
            tracing::warn!(provider = %PROVIDER, "Webhook without Stripe-Signature header");
            return false;
        };

        let header = match SignatureHeader::parse(raw_header) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
                return false;
            }
        };

        self.verify_signature(secret, payload, &header, chrono::Utc::now().timestamp())
            .is_ok()
    }

    fn parse_callback(&self, raw_payload: &[u8]) -> Result<PaymentWebhookEvent, PaymentError> {
        let event: StripeWebhookEvent = serde_json::from_slice(raw_payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            PaymentError::invalid_webhook(format!("Invalid JSON: {}", e)).with_provider(PROVIDER)
        })?;

        let object = event.object().map_err(|e| {
            PaymentError::invalid_webhook(format!("Invalid {} object: {}", event.event_type, e))
                .with_provider(PROVIDER)
        })?;

        let raw = String::from_utf8_lossy(raw_payload).into_owned();

        let normalized = match object {
            StripeEventObject::CheckoutSession(session) => {
                let word = match event.event_type.as_str() {
                    "checkout.session.async_payment_succeeded" => "paid",
                    "checkout.session.async_payment_failed" => "payment_failed",
                    "checkout.session.expired" => "expired",
                    _ => Self::session_status_word(&session),
                };
                let currency = Self::parse_currency(session.currency.as_deref());
                let mut metadata = session.metadata.clone();
                if let Some(reference) = &session.client_reference_id {
                    metadata
                        .entry("order_id".to_string())
                        .or_insert_with(|| reference.clone());
                }
                PaymentWebhookEvent {
                    provider: PROVIDER,
                    event_type: event.event_type.clone(),
                    session_id: Some(session.id.clone()),
                    payment_id: session.payment_intent.clone(),
                    status: normalize(PROVIDER, word),
                    amount: Self::minor_to_major(session.amount_total, currency.as_ref()),
                    currency,
                    metadata,
                    raw_payload: raw,
                }
            }
            StripeEventObject::PaymentIntent(intent) => {
                let word = match event.event_type.as_str() {
                    "payment_intent.payment_failed" => "payment_failed",
                    "payment_intent.canceled" => "canceled",
                    _ => intent.status.as_str(),
                };
                if let Some(error) = &intent.last_payment_error {
                    tracing::info!(
                        payment_id = %intent.id,
                        code = ?error.code,
                        message = ?error.message,
                        "Stripe payment attempt failed"
                    );
                }
                let currency = Self::parse_currency(intent.currency.as_deref());
                PaymentWebhookEvent {
                    provider: PROVIDER,
                    event_type: event.event_type.clone(),
                    session_id: None,
                    payment_id: Some(intent.id.clone()),
                    status: normalize(PROVIDER, word),
                    amount: Self::minor_to_major(
                        intent.amount_received.filter(|a| *a > 0).or(intent.amount),
                        currency.as_ref(),
                    ),
                    currency,
                    metadata: intent.metadata.clone(),
                    raw_payload: raw,
                }
            }
            StripeEventObject::Unknown => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "Informational Stripe event, no status change"
                );
                PaymentWebhookEvent {
                    provider: PROVIDER,
                    event_type: event.event_type.clone(),
                    session_id: None,
                    payment_id: None,
                    status: PaymentStatus::Pending,
                    amount: None,
                    currency: None,
                    metadata: Default::default(),
                    raw_payload: raw,
                }
            }
        };

        Ok(normalized)
    }

    async fn transaction_status(
        &self,
        session_id: &str,
    ) -> Result<ProviderTransactionStatus, PaymentError> {
        let secret_key = self.secret_key()?;
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.config.api_base_url, session_id
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(secret_key.expose_secret())
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::not_found("Checkout session").with_provider(PROVIDER));
        }
        if !response.status().is_success() {
            return Err(Self::rejection(response, "transaction_status").await);
        }

        let session: StripeCheckoutSession = response.json().await.map_err(|e| {
            PaymentError::invalid_response(PROVIDER, format!("Failed to parse Stripe response: {}", e))
        })?;

        let word = Self::session_status_word(&session).to_string();
        let currency = Self::parse_currency(session.currency.as_deref());

        Ok(ProviderTransactionStatus {
            provider: PROVIDER,
            session_id: session.id.clone(),
            status: normalize(PROVIDER, &word),
            provider_status: word,
            payment_id: session.payment_intent.clone(),
            amount: Self::minor_to_major(session.amount_total, currency.as_ref()),
            currency,
        })
    }

    async fn cancel_session(&self, session_id: &str) -> Result<(), PaymentError> {
        let secret_key = self.secret_key()?;
        let url = format!(
            "{}/v1/checkout/sessions/{}/expire",
            self.config.api_base_url, session_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(secret_key.expose_secret())
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if response.status().is_success() {
            tracing::info!(session_id, "Stripe checkout session expired");
            return Ok(());
        }

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            // Stripe refuses to expire sessions that are no longer open.
            let current = self.transaction_status(session_id).await?;
            if current.status.is_terminal() {
                tracing::info!(
                    session_id,
                    status = %current.status,
                    "Stripe session already finished, nothing to cancel"
                );
                return Ok(());
            }
        }

        Err(Self::rejection(response, "cancel_session").await)
    }
}
