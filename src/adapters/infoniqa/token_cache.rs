//! Access token cache for the ledger API.
//!
//! One token is shared by all ledger calls. The lock is held across the
//! token exchange so concurrent callers wait for a single refresh instead of
//! each fetching their own.

use secrecy::SecretString;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::foundation::Timestamp;
use crate::ports::LedgerError;

/// Token handed out by the identity provider.
#[derive(Clone)]
pub struct CachedAccessToken {
    pub access_token: SecretString,
    pub expires_at: Timestamp,
}

impl CachedAccessToken {
    /// A token valid for `expires_in` from now.
    pub fn new(access_token: SecretString, expires_in: Duration) -> Self {
        Self {
            access_token,
            expires_at: Timestamp::now().add_std(expires_in),
        }
    }

    /// Usable at `now` while keeping `margin` before expiry.
    pub fn is_fresh(&self, now: &Timestamp, margin: Duration) -> bool {
        now.add_std(margin).is_before(&self.expires_at)
    }
}

impl std::fmt::Debug for CachedAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedAccessToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub struct TokenCache {
    slot: Mutex<Option<CachedAccessToken>>,
    safety_margin: Duration,
}

impl TokenCache {
    pub fn new(safety_margin: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            safety_margin,
        }
    }

    /// Returns the cached token, running `refresh` first if it is missing
    /// or inside the safety margin.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<SecretString, LedgerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedAccessToken, LedgerError>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(token) = slot.as_ref() {
            if token.is_fresh(&Timestamp::now(), self.safety_margin) {
                return Ok(token.access_token.clone());
            }
            tracing::debug!(expires_at = %token.expires_at, "Ledger access token near expiry");
        }

        let fresh = refresh().await?;
        let access_token = fresh.access_token.clone();
        *slot = Some(fresh);
        Ok(access_token)
    }

    /// Drops the cached token, e.g. after the API rejected it.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
