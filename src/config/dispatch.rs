//! Side-effect dispatch configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::DispatcherConfig;

/// Retry policy for post-payment side effects
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Delivered idempotency keys remembered per process
    #[serde(default = "default_delivered_capacity")]
    pub delivered_capacity: usize,
}

impl DispatchConfig {
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            delivered_capacity: self.delivered_capacity,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 || self.max_attempts > 10 {
            return Err(ValidationError::InvalidMaxAttempts);
        }
        if self.delivered_capacity == 0 {
            return Err(ValidationError::InvalidDeliveredCapacity);
        }
        Ok(())
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            delivered_capacity: default_delivered_capacity(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_delivered_capacity() -> usize {
    10_000
}
