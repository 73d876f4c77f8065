//! Notification sender that only logs.
//!
//! Used when no mail transport is configured, and by tests that need to see
//! what would have been sent.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::dispatch::EmailMessage;
use crate::ports::{NotificationError, NotificationSender};

#[derive(Default)]
struct OutboxState {
    sent: Vec<EmailMessage>,
    failures_remaining: u32,
}

/// Logs every message and keeps a copy in memory.
#[derive(Clone, Default)]
pub struct LoggingNotificationSender {
    state: Arc<Mutex<OutboxState>>,
}

impl LoggingNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, OutboxState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Messages "sent" so far, oldest first.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.state().sent.clone()
    }

    /// Number of messages sent to `to`.
    pub fn sent_to(&self, to: &str) -> usize {
        self.state().sent.iter().filter(|m| m.to == to).count()
    }

    /// Makes the next `count` sends fail with a transport error.
    pub fn fail_next(&self, count: u32) {
        self.state().failures_remaining = count;
    }
}

#[async_trait]
impl NotificationSender for LoggingNotificationSender {
    async fn send(&self, message: &EmailMessage) -> Result<Option<String>, NotificationError> {
        let mut state = self.state();
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(NotificationError::Transport("simulated outage".to_string()));
        }

        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "E-mail not sent (no transport configured), logged only"
        );
        state.sent.push(message.clone());
        Ok(None)
    }
}
