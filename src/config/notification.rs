//! Notification configuration (Resend)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::notification::ResendConfig;

/// Transactional e-mail configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Resend API key; e-mails are only logged without it
    pub resend_api_key: Option<SecretString>,

    /// From email address
    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// From name
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Recipient of the order notification for fulfillment
    #[serde(default = "default_fulfillment_email")]
    pub fulfillment_email: String,
}

impl NotificationConfig {
    /// Get formatted "From" header value
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    /// Resend adapter configuration, if an API key is set
    pub fn resend_config(&self, timeout: Duration) -> Option<ResendConfig> {
        self.resend_api_key.as_ref().map(|key| {
            ResendConfig::new(self.from_header())
                .with_api_key(key.expose_secret().clone())
                .with_timeout(timeout)
        })
    }

    /// Validate notification configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(key) = &self.resend_api_key {
            if !key.expose_secret().starts_with("re_") {
                return Err(ValidationError::InvalidResendKey);
            }
        }
        if !self.from_email.contains('@') {
            return Err(ValidationError::InvalidEmail("notification.from_email"));
        }
        if !self.fulfillment_email.contains('@') {
            return Err(ValidationError::InvalidEmail("notification.fulfillment_email"));
        }
        Ok(())
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            from_email: default_from_email(),
            from_name: default_from_name(),
            fulfillment_email: default_fulfillment_email(),
        }
    }
}

fn default_from_email() -> String {
    "noreply@bauprodukt.ch".to_string()
}

fn default_from_name() -> String {
    "Bauprodukt".to_string()
}

fn default_fulfillment_email() -> String {
    "fulfillment@swissvfg.ch".to_string()
}
