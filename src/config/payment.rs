//! Payment configuration (Stripe, Datatrans and checkout defaults)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::validate_url;
use crate::adapters::datatrans::DatatransConfig;
use crate::adapters::stripe::StripeConfig;
use crate::domain::payment::Currency;

/// Payment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Currency charged when an order carries none
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Lifetime requested for new checkout sessions
    #[serde(default = "default_session_expiry")]
    pub session_expiry_minutes: u64,

    /// Timeout for every call to a payment provider
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Public storefront URL; checkout return links are built from it
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,

    #[serde(default)]
    pub stripe: StripeSettings,

    #[serde(default)]
    pub datatrans: DatatransSettings,
}

/// Stripe credentials; all optional until first use
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeSettings {
    pub secret_key: Option<SecretString>,
    pub webhook_secret: Option<SecretString>,
    pub api_base_url: Option<String>,
}

/// Datatrans credentials; all optional until first use
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatatransSettings {
    pub merchant_id: Option<String>,
    pub password: Option<SecretString>,
    pub sign_key: Option<SecretString>,
    pub api_base_url: Option<String>,
    pub pay_base_url: Option<String>,

    /// Where Datatrans posts transaction updates
    pub webhook_url: Option<String>,
}

impl PaymentConfig {
    pub fn currency(&self) -> Result<Currency, ValidationError> {
        Currency::new(&self.default_currency)
            .map_err(|_| ValidationError::InvalidCurrency(self.default_currency.clone()))
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn session_expiry(&self) -> Duration {
        Duration::from_secs(self.session_expiry_minutes * 60)
    }

    /// Check if using Stripe test mode
    pub fn is_stripe_test_mode(&self) -> bool {
        self.stripe
            .secret_key
            .as_ref()
            .is_some_and(|key| key.expose_secret().starts_with("sk_test_"))
    }

    /// Stripe adapter configuration
    pub fn stripe_config(&self) -> Result<StripeConfig, ValidationError> {
        let mut config = StripeConfig::new()
            .with_default_currency(self.currency()?)
            .with_session_expiry(self.session_expiry())
            .with_timeout(self.provider_timeout());
        if let Some(key) = &self.stripe.secret_key {
            config = config.with_secret_key(key.expose_secret().clone());
        }
        if let Some(secret) = &self.stripe.webhook_secret {
            config = config.with_webhook_secret(secret.expose_secret().clone());
        }
        if let Some(url) = &self.stripe.api_base_url {
            config = config.with_base_url(url.clone());
        }
        Ok(config)
    }

    /// Datatrans adapter configuration
    pub fn datatrans_config(&self) -> Result<DatatransConfig, ValidationError> {
        let settings = &self.datatrans;
        let mut config = DatatransConfig::new()
            .with_default_currency(self.currency()?)
            .with_session_expiry(self.session_expiry())
            .with_timeout(self.provider_timeout());
        if let (Some(merchant_id), Some(password)) = (&settings.merchant_id, &settings.password) {
            config = config.with_credentials(merchant_id.clone(), password.expose_secret().clone());
        }
        if let Some(key) = &settings.sign_key {
            config = config.with_sign_key(key.expose_secret().clone());
        }
        if let Some(url) = &settings.api_base_url {
            config = config.with_api_base_url(url.clone());
        }
        if let Some(url) = &settings.pay_base_url {
            config = config.with_pay_base_url(url.clone());
        }
        if let Some(url) = &settings.webhook_url {
            config = config.with_webhook_url(url.clone());
        }
        Ok(config)
    }

    /// Validate payment configuration
    ///
    /// Only formats are checked. Missing credentials surface as
    /// `NotConfigured` on first use.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.currency()?;
        validate_url("payment.app_base_url", &self.app_base_url)?;

        if self.session_expiry_minutes == 0 || self.session_expiry_minutes > 24 * 60 {
            return Err(ValidationError::InvalidSessionExpiry);
        }
        if self.provider_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        // Verify key prefixes for safety
        if let Some(key) = &self.stripe.secret_key {
            if !key.expose_secret().starts_with("sk_") {
                return Err(ValidationError::InvalidStripeKey);
            }
        }
        if let Some(secret) = &self.stripe.webhook_secret {
            if !secret.expose_secret().starts_with("whsec_") {
                return Err(ValidationError::InvalidStripeWebhookSecret);
            }
        }

        if let Some(url) = &self.stripe.api_base_url {
            validate_url("payment.stripe.api_base_url", url)?;
        }
        if let Some(url) = &self.datatrans.api_base_url {
            validate_url("payment.datatrans.api_base_url", url)?;
        }
        if let Some(url) = &self.datatrans.pay_base_url {
            validate_url("payment.datatrans.pay_base_url", url)?;
        }
        if let Some(url) = &self.datatrans.webhook_url {
            validate_url("payment.datatrans.webhook_url", url)?;
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            session_expiry_minutes: default_session_expiry(),
            provider_timeout_secs: default_provider_timeout(),
            app_base_url: default_app_base_url(),
            stripe: StripeSettings::default(),
            datatrans: DatatransSettings::default(),
        }
    }
}

fn default_currency() -> String {
    "CHF".to_string()
}

fn default_session_expiry() -> u64 {
    30
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_app_base_url() -> String {
    "http://localhost:3000".to_string()
}
