//! Infoniqa ONE ledger sync adapter.
//!
//! Posts paid orders to the accounting system. Every request carries the
//! order number as `X-External-Reference`; the ledger answers a repeated
//! reference with `409` and the existing transaction id, which counts as
//! success. Access tokens come from an Auth0 client-credentials exchange.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::order::OrderRecord;
use crate::ports::{LedgerError, LedgerSync, LedgerSyncReceipt, LedgerTransactionStatus};

use super::token_cache::{CachedAccessToken, TokenCache};

/// Token lifetime assumed when the identity provider omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Ledger API and identity provider configuration.
#[derive(Clone)]
pub struct InfoniqaConfig {
    api_base_url: Option<String>,
    token_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    audience: Option<String>,

    /// Tokens are refreshed this long before they expire.
    token_safety_margin: Duration,

    timeout: Duration,
}

impl Default for InfoniqaConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            token_url: None,
            client_id: None,
            client_secret: None,
            audience: None,
            token_safety_margin: Duration::from_secs(300),
            timeout: Duration::from_secs(10),
        }
    }
}

impl InfoniqaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self.audience = Some(audience.into());
        self
    }

    pub fn with_token_safety_margin(mut self, margin: Duration) -> Self {
        self.token_safety_margin = margin;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Wire Types
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LedgerTransaction<'a> {
    order_number: &'a str,
    customer_name: &'a str,
    customer_email: &'a str,
    customer_address: LedgerAddress<'a>,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    payment_provider: Option<&'static str>,
    payment_status: &'static str,
    transaction_date: String,
    payment_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LedgerAddress<'a> {
    street: &'a str,
    postal_code: &'a str,
    city: &'a str,
    country: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerResponse {
    transaction_id: Option<String>,
    status: Option<String>,
    message: Option<String>,
}

impl<'a> LedgerTransaction<'a> {
    fn from_order(order: &'a OrderRecord, paid_at: String) -> Self {
        Self {
            order_number: order.order_number.as_str(),
            customer_name: &order.customer_name,
            customer_email: &order.customer_email,
            customer_address: LedgerAddress {
                street: &order.shipping_address.street,
                postal_code: &order.shipping_address.postal_code,
                city: &order.shipping_address.city,
                country: &order.shipping_address.country,
            },
            amount: order.total_amount,
            currency: order.currency.as_str(),
            payment_provider: order.payment_provider.map(|p| p.as_str()),
            payment_status: "paid",
            transaction_date: paid_at,
            payment_id: order.provider_payment_id.as_deref(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Adapter
// ════════════════════════════════════════════════════════════════════════════════

/// Infoniqa ledger adapter.
pub struct InfoniqaLedgerAdapter {
    config: InfoniqaConfig,
    tokens: TokenCache,
    http_client: reqwest::Client,
}

impl InfoniqaLedgerAdapter {
    pub fn new(config: InfoniqaConfig) -> Self {
        Self {
            tokens: TokenCache::new(config.token_safety_margin),
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn api_base_url(&self) -> Result<&str, LedgerError> {
        self.config
            .api_base_url
            .as_deref()
            .ok_or_else(|| LedgerError::NotConfigured("api_base_url".to_string()))
    }

    fn transport_error(e: reqwest::Error) -> LedgerError {
        if e.is_timeout() {
            LedgerError::Timeout
        } else {
            LedgerError::Transport(e.to_string())
        }
    }

    async fn access_token(&self) -> Result<SecretString, LedgerError> {
        self.tokens.get_or_refresh(|| self.fetch_token()).await
    }

    /// Client-credentials exchange against the identity provider.
    async fn fetch_token(&self) -> Result<CachedAccessToken, LedgerError> {
        let missing = |name: &str| LedgerError::NotConfigured(name.to_string());
        let token_url = self.config.token_url.as_deref().ok_or_else(|| missing("token_url"))?;
        let client_id = self.config.client_id.as_deref().ok_or_else(|| missing("client_id"))?;
        let client_secret = self
            .config
            .client_secret
            .as_ref()
            .ok_or_else(|| missing("client_secret"))?;
        let audience = self.config.audience.as_deref().ok_or_else(|| missing("audience"))?;

        let response = self
            .http_client
            .post(token_url)
            .timeout(self.config.timeout)
            .json(&TokenRequest {
                grant_type: "client_credentials",
                client_id,
                client_secret: client_secret.expose_secret(),
                audience,
            })
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            tracing::error!(status, "Ledger token exchange rejected");
            return Err(LedgerError::Remote {
                status,
                message: "Token exchange failed".to_string(),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| LedgerError::Remote {
            status,
            message: format!("Invalid token response: {}", e),
        })?;
        let access_token = body.access_token.ok_or_else(|| LedgerError::Remote {
            status,
            message: "Token response has no access_token".to_string(),
        })?;
        let lifetime = body.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        tracing::debug!(expires_in = lifetime, "Ledger access token refreshed");
        Ok(CachedAccessToken::new(
            SecretString::new(access_token),
            Duration::from_secs(lifetime),
        ))
    }

    async fn read_body(response: reqwest::Response) -> LedgerResponse {
        let text = response.text().await.unwrap_or_default();
        serde_json::from_str(&text).unwrap_or_else(|_| LedgerResponse {
            message: (!text.is_empty()).then_some(text),
            ..Default::default()
        })
    }

    /// Maps a non-success answer; drops the token when it was refused.
    async fn remote_error(&self, status: u16, body: LedgerResponse) -> LedgerError {
        if status == 401 {
            tracing::warn!("Ledger rejected access token, invalidating cache");
            self.tokens.invalidate().await;
        }
        LedgerError::Remote {
            status,
            message: body
                .message
                .unwrap_or_else(|| format!("Ledger request failed with status {}", status)),
        }
    }
}

#[async_trait]
impl LedgerSync for InfoniqaLedgerAdapter {
    async fn sync(&self, order: &OrderRecord) -> Result<LedgerSyncReceipt, LedgerError> {
        let paid_at = match order.paid_at {
            Some(paid_at) if order.is_settled() => paid_at,
            _ => {
                return Err(LedgerError::OrderNotPaid {
                    order_number: order.order_number.to_string(),
                })
            }
        };
        let base_url = self.api_base_url()?;
        let token = self.access_token().await?;

        let response = self
            .http_client
            .post(format!("{}/transactions", base_url))
            .bearer_auth(token.expose_secret())
            .header("X-External-Reference", order.order_number.as_str())
            .timeout(self.config.timeout)
            .json(&LedgerTransaction::from_order(order, paid_at.to_string()))
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status().as_u16();
        let success = response.status().is_success();
        let body = Self::read_body(response).await;

        if success || status == 409 {
            let deduplicated = status == 409;
            let Some(transaction_id) = body.transaction_id else {
                return Err(LedgerError::Remote {
                    status,
                    message: "Response has no transactionId".to_string(),
                });
            };

            tracing::info!(
                order_number = %order.order_number,
                transaction_id = %transaction_id,
                deduplicated,
                "Order synced to ledger"
            );
            return Ok(LedgerSyncReceipt {
                external_transaction_id: transaction_id,
                success: true,
                deduplicated,
            });
        }

        tracing::error!(order_number = %order.order_number, status, "Ledger sync rejected");
        Err(self.remote_error(status, body).await)
    }

    async fn transaction_status(
        &self,
        external_transaction_id: &str,
    ) -> Result<LedgerTransactionStatus, LedgerError> {
        let base_url = self.api_base_url()?;
        let token = self.access_token().await?;

        let response = self
            .http_client
            .get(format!("{}/transactions/{}", base_url, external_transaction_id))
            .bearer_auth(token.expose_secret())
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status().as_u16();
        let success = response.status().is_success();
        let body = Self::read_body(response).await;

        if !success {
            return Err(self.remote_error(status, body).await);
        }

        Ok(LedgerTransactionStatus {
            external_transaction_id: body
                .transaction_id
                .unwrap_or_else(|| external_transaction_id.to_string()),
            status: body.status.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
