//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `STOREFRONT` prefix and nested values use double underscores as separators.
//!
//! Every credential is optional. A missing key does not stop the service from
//! starting; the affected adapter answers `NotConfigured` on first use.
//!
//! # Example
//!
//! ```no_run
//! use storefront_payments::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod dispatch;
mod error;
mod ledger;
mod notification;
mod payment;
mod server;

pub use dispatch::DispatchConfig;
pub use error::{ConfigError, ValidationError};
pub use ledger::LedgerConfig;
pub use notification::NotificationConfig;
pub use payment::{DatatransSettings, PaymentConfig, StripeSettings};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Payment providers and checkout defaults
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Accounting ledger (Infoniqa)
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Transactional e-mail (Resend)
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Side-effect retry policy
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `STOREFRONT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `STOREFRONT__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `STOREFRONT__PAYMENT__STRIPE__SECRET_KEY=...` -> `payment.stripe.secret_key = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("STOREFRONT")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Outbound calls must time out before the inbound request does, so a
    /// slow provider surfaces as a mapped error instead of a dropped request.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.payment.validate()?;
        self.ledger.validate()?;
        self.notification.validate()?;
        self.dispatch.validate()?;

        let request_secs = self.server.request_timeout_secs;
        for (section, outbound_secs) in [
            ("payment", self.payment.provider_timeout_secs),
            ("ledger", self.ledger.timeout_secs),
        ] {
            if outbound_secs >= request_secs {
                return Err(ValidationError::OutboundTimeoutTooLong {
                    section,
                    outbound_secs,
                    request_secs,
                });
            }
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

/// Accepts absolute http(s) URLs only.
fn validate_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::InvalidUrl(field)),
    }
}
