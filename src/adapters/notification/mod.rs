//! Notification adapters.

mod logging_sender;
mod resend_sender;

pub use logging_sender::LoggingNotificationSender;
pub use resend_sender::{ResendConfig, ResendNotificationSender};
