//! Ledger configuration (Infoniqa)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::validate_url;
use crate::adapters::infoniqa::InfoniqaConfig;

/// Infoniqa API and Auth0 client-credentials settings
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub api_base_url: Option<String>,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub audience: Option<String>,

    /// Tokens are refreshed this long before they expire
    #[serde(default = "default_token_safety_margin")]
    pub token_safety_margin_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether every value needed to reach the ledger is present
    pub fn is_configured(&self) -> bool {
        self.api_base_url.is_some()
            && self.token_url.is_some()
            && self.client_id.is_some()
            && self.client_secret.is_some()
            && self.audience.is_some()
    }

    /// Infoniqa adapter configuration
    pub fn infoniqa_config(&self) -> InfoniqaConfig {
        let mut config = InfoniqaConfig::new()
            .with_token_safety_margin(Duration::from_secs(self.token_safety_margin_secs))
            .with_timeout(self.timeout());
        if let Some(url) = &self.api_base_url {
            config = config.with_api_base_url(url.clone());
        }
        if let Some(url) = &self.token_url {
            config = config.with_token_url(url.clone());
        }
        if let (Some(id), Some(secret), Some(audience)) =
            (&self.client_id, &self.client_secret, &self.audience)
        {
            config = config.with_client_credentials(
                id.clone(),
                secret.expose_secret().clone(),
                audience.clone(),
            );
        }
        config
    }

    /// Validate ledger configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.api_base_url {
            validate_url("ledger.api_base_url", url)?;
        }
        if let Some(url) = &self.token_url {
            validate_url("ledger.token_url", url)?;
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            token_url: None,
            client_id: None,
            client_secret: None,
            audience: None,
            token_safety_margin_secs: default_token_safety_margin(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_token_safety_margin() -> u64 {
    300
}

fn default_timeout() -> u64 {
    10
}
