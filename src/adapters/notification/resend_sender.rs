//! Resend e-mail transport.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::dispatch::EmailMessage;
use crate::ports::{NotificationError, NotificationSender};

#[derive(Clone)]
pub struct ResendConfig {
    api_key: Option<SecretString>,

    /// Formatted `From` header, e.g. `Bauprodukt <noreply@bauprodukt.ch>`.
    from: String,

    api_base_url: String,
    timeout: Duration,
}

impl ResendConfig {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            api_key: None,
            from: from.into(),
            api_base_url: "https://api.resend.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(key.into()));
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

#[derive(Deserialize)]
struct ResendErrorBody {
    message: Option<String>,
}

pub struct ResendNotificationSender {
    config: ResendConfig,
    http_client: reqwest::Client,
}

impl ResendNotificationSender {
    pub fn new(config: ResendConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationSender for ResendNotificationSender {
    async fn send(&self, message: &EmailMessage) -> Result<Option<String>, NotificationError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| NotificationError::NotConfigured("resend_api_key".to_string()))?;

        let response = self
            .http_client
            .post(format!("{}/emails", self.config.api_base_url))
            .bearer_auth(api_key.expose_secret())
            .timeout(self.config.timeout)
            .json(&SendEmailRequest {
                from: &self.config.from,
                to: [message.to.as_str()],
                subject: &message.subject,
                html: &message.html,
                text: message.text.as_deref(),
            })
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ResendErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            tracing::error!(status, error = %message, "Resend rejected e-mail");
            return Err(NotificationError::Rejected { status, message });
        }

        let id = response
            .json::<SendEmailResponse>()
            .await
            .ok()
            .and_then(|r| r.id);
        tracing::info!(to = %message.to, subject = %message.subject, message_id = ?id, "E-mail sent");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> EmailMessage {
        EmailMessage {
            to: "anna@example.ch".to_string(),
            subject: "Bestellbestätigung - ORD-1001".to_string(),
            html: "<p>Danke</p>".to_string(),
            text: None,
        }
    }

    fn config(server: &MockServer) -> ResendConfig {
        ResendConfig::new("Bauprodukt <noreply@bauprodukt.ch>")
            .with_api_key("re_test")
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn sends_message_and_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_partial_json(serde_json::json!({
                "from": "Bauprodukt <noreply@bauprodukt.ch>",
                "to": ["anna@example.ch"],
                "subject": "Bestellbestätigung - ORD-1001"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "msg_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let sender = ResendNotificationSender::new(config(&server));
        let id = sender.send(&message()).await.unwrap();
        assert_eq!(id.as_deref(), Some("msg_1"));
    }

    #[tokio::test]
    async fn rejection_carries_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "statusCode": 422,
                "message": "Invalid `from` field"
            })))
            .mount(&server)
            .await;

        let sender = ResendNotificationSender::new(config(&server));
        let err = sender.send(&message()).await.unwrap_err();
        assert_eq!(
            err,
            NotificationError::Rejected {
                status: 422,
                message: "Invalid `from` field".to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let sender = ResendNotificationSender::new(ResendConfig::new("noreply@bauprodukt.ch"));
        let err = sender.send(&message()).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotConfigured(_)));
    }
}
