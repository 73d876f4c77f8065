//! Notification sender port for transactional e-mail.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::dispatch::EmailMessage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("Mail transport not configured: {0}")]
    NotConfigured(String),

    #[error("Mail provider rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Mail transport failed: {0}")]
    Transport(String),
}

/// Port for sending e-mails.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Sends one message. Returns the provider's message id when known.
    async fn send(&self, message: &EmailMessage) -> Result<Option<String>, NotificationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_sender_is_object_safe() {
        fn _accepts_dyn(_sender: &dyn NotificationSender) {}
    }

    #[test]
    fn rejected_error_displays_status() {
        let err = NotificationError::Rejected {
            status: 422,
            message: "invalid from".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Mail provider rejected message (422): invalid from"
        );
    }
}
