//! # Notification Delivery
//!
//! The [`Notifier`] collaborator used by the check-in monitor, with an HTTP
//! email provider client and a log-only fallback.

use crate::config::{notify::SEND_TIMEOUT, MailSettings};
use crate::error::{NotificationError, NotificationResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single outbound email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Provider acknowledgement of an accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

/// Outbound notification capability.
///
/// Implementations make exactly one attempt per call; retries happen on the
/// next monitor sweep.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    async fn send(&self, email: &OutboundEmail) -> NotificationResult<DeliveryReceipt>;
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    id: String,
}

/// Client for a JSON email provider API
#[derive(Debug, Clone)]
pub struct HttpEmailSender {
    client: Client,
    settings: MailSettings,
}

impl HttpEmailSender {
    pub fn new(settings: MailSettings) -> NotificationResult<Self> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| NotificationError::transport(format!("client creation: {}", e)))?;

        Ok(Self { client, settings })
    }

    fn request_body(&self, email: &OutboundEmail) -> serde_json::Value {
        serde_json::json!({
            "from": self.settings.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html_body,
            "text": email.text_body,
        })
    }
}

#[async_trait]
impl Notifier for HttpEmailSender {
    async fn send(&self, email: &OutboundEmail) -> NotificationResult<DeliveryReceipt> {
        let mut request = self
            .client
            .post(&self.settings.endpoint)
            .json(&self.request_body(email));
        if let Some(api_key) = &self.settings.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            message.truncate(200);
            return Err(NotificationError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body: ProviderResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::InvalidResponse {
                message: e.to_string(),
            })?;

        Ok(DeliveryReceipt { message_id: body.id })
    }
}

/// Notifier that only logs, for running without a mail provider
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &OutboundEmail) -> NotificationResult<DeliveryReceipt> {
        log::info!("Notification to {}: {}", email.to, email.subject);
        Ok(DeliveryReceipt {
            message_id: format!("log-{}", uuid::Uuid::new_v4()),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Test double that records sends and fails for chosen recipients
    #[derive(Debug, Default)]
    pub(crate) struct RecordingNotifier {
        sent: Mutex<Vec<OutboundEmail>>,
        failing: Mutex<BTreeSet<String>>,
    }

    impl RecordingNotifier {
        pub(crate) fn fail_for(&self, recipient: &str) {
            self.failing.lock().unwrap().insert(recipient.to_string());
        }

        pub(crate) fn recover(&self, recipient: &str) {
            self.failing.lock().unwrap().remove(recipient);
        }

        pub(crate) fn sent(&self) -> Vec<OutboundEmail> {
            self.sent.lock().unwrap().clone()
        }

        pub(crate) fn sent_to(&self, recipient: &str) -> usize {
            self.sent().iter().filter(|email| email.to == recipient).count()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, email: &OutboundEmail) -> NotificationResult<DeliveryReceipt> {
            if self.failing.lock().unwrap().contains(&email.to) {
                return Err(NotificationError::Http {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push(email.clone());
            Ok(DeliveryReceipt {
                message_id: format!("msg-{}", sent.len()),
            })
        }
    }

    fn email() -> OutboundEmail {
        OutboundEmail {
            to: "owner@example.com".to_string(),
            subject: "Check in".to_string(),
            html_body: "<p>Check in</p>".to_string(),
            text_body: "Check in".to_string(),
        }
    }

    #[test]
    fn test_request_body() {
        let sender = HttpEmailSender::new(MailSettings {
            endpoint: "https://mail.example.com/emails".to_string(),
            api_key: Some("key".to_string()),
            from: "Vaults <vaults@example.com>".to_string(),
        })
        .unwrap();

        let body = sender.request_body(&email());
        assert_eq!(body["from"], "Vaults <vaults@example.com>");
        assert_eq!(body["to"][0], "owner@example.com");
        assert_eq!(body["text"], "Check in");
    }

    #[tokio::test]
    async fn test_log_notifier() {
        let receipt = LogNotifier.send(&email()).await.unwrap();
        assert!(receipt.message_id.starts_with("log-"));
    }

    #[tokio::test]
    async fn test_recording_notifier_failures() {
        let notifier = RecordingNotifier::default();
        notifier.fail_for("owner@example.com");
        assert!(notifier.send(&email()).await.unwrap_err().is_retryable());

        notifier.recover("owner@example.com");
        notifier.send(&email()).await.unwrap();
        assert_eq!(notifier.sent_to("owner@example.com"), 1);
    }
}
