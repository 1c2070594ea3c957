//! Chat webhook notifications.
//!
//! A message is `POST`ed as `{"msgtype": "text", "text": {"content": ..,
//! "mentioned_mobile_list": [..]}}`. Only HTTP 200 counts as delivered. A
//! failed attempt (transport error or any other status) is reissued at once,
//! up to the configured number of attempts.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use thiserror::Error;

use crate::retrieve::ky_http::{ApiClient, ClientAuth, HttpError};

pub const DEFAULT_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Webhook URL is not configured")]
    NotConfigured,

    #[error("Webhook client error: {0}")]
    Client(#[from] HttpError),

    #[error("Webhook failed after {attempts} attempts, last: {last}")]
    Exhausted { attempts: u32, last: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextContent {
    pub content: String,
    pub mentioned_mobile_list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMessage {
    pub msgtype: &'static str,
    pub text: TextContent,
}

impl TextMessage {
    pub fn new(content: &str, mentions: &[String]) -> Self {
        Self {
            msgtype: "text",
            text: TextContent {
                content: content.to_string(),
                mentioned_mobile_list: mentions.to_vec(),
            },
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a text message. Returns the attempt that succeeded.
    async fn send_text(&self, content: &str, mentions: &[String]) -> Result<u32, NotifyError>;
}

pub struct WebhookNotifier {
    client: Option<ApiClient>,
    attempts: u32,
}

impl WebhookNotifier {
    /// An empty `url` builds a notifier that reports `NotConfigured` on every send.
    pub fn new(url: &str, attempts: u32) -> Result<Self, NotifyError> {
        let client = if url.trim().is_empty() {
            None
        } else {
            Some(ApiClient::new(url.trim(), ClientAuth::None, 0)?)
        };
        Ok(Self {
            client,
            attempts: attempts.max(1),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_text(&self, content: &str, mentions: &[String]) -> Result<u32, NotifyError> {
        let client = self.client.as_ref().ok_or(NotifyError::NotConfigured)?;
        let message = TextMessage::new(content, mentions);
        let mut last = String::new();

        for attempt in 1..=self.attempts {
            match client
                .request_text(Method::POST, "", None, Some(&message))
                .await
            {
                Ok(response) if response.status == 200 => return Ok(attempt),
                Ok(response) => last = format!("HTTP {}", response.status),
                Err(e) => last = e.to_string(),
            }
            log::warn!(
                "Webhook attempt {}/{} failed: {}",
                attempt,
                self.attempts,
                last
            );
        }

        Err(NotifyError::Exhausted {
            attempts: self.attempts,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_shape() {
        let msg = TextMessage::new("Acme-JumpServer-support", &["13800000000".to_string()]);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "msgtype": "text",
                "text": {
                    "content": "Acme-JumpServer-support",
                    "mentioned_mobile_list": ["13800000000"]
                }
            })
        );
    }

    #[tokio::test]
    async fn test_unconfigured_webhook_is_reported() {
        let notifier = WebhookNotifier::new("  ", DEFAULT_ATTEMPTS).unwrap();
        assert!(!notifier.is_configured());
        let result = notifier.send_text("hello", &[]).await;
        assert!(matches!(result, Err(NotifyError::NotConfigured)));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", 0).unwrap();
        assert_eq!(notifier.attempts, 1);
    }
}
