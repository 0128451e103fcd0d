//! Operator alerts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use delta_hedge_core::{GatewayError, Notifier, TelegramConfig};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Sends alerts through the Telegram Bot API `sendMessage` method.
pub struct TelegramNotifier {
    client: Client,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(config: &TelegramConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: send_message_url(config),
            chat_id: config.chat_id.clone(),
        })
    }
}

fn send_message_url(config: &TelegramConfig) -> String {
    format!(
        "{}/bot{}/sendMessage",
        config.api_url.trim_end_matches('/'),
        config.token
    )
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: message,
        };

        let result = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(_) => debug!("Telegram alert sent"),
            // The error text may embed the URL, which carries the bot token.
            Err(e) => warn!(
                status = ?e.status(),
                timeout = e.is_timeout(),
                "Failed to send Telegram alert"
            ),
        }
    }
}

/// Writes alerts to the log when no messaging channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        warn!(alert = message, "Operator alert");
    }
}

/// Telegram when configured, otherwise the log.
///
/// # Errors
/// Returns error if the Telegram HTTP client cannot be constructed
pub fn from_config(config: Option<&TelegramConfig>) -> Result<Arc<dyn Notifier>, GatewayError> {
    match config {
        Some(telegram) => Ok(Arc::new(TelegramNotifier::new(telegram)?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telegram() -> TelegramConfig {
        TelegramConfig {
            token: "123:abc".to_string(),
            chat_id: "-100200".to_string(),
            api_url: "https://api.telegram.org/".to_string(),
        }
    }

    #[test]
    fn builds_send_message_url() {
        assert_eq!(
            send_message_url(&telegram()),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn payload_shape() {
        let body = SendMessage {
            chat_id: "-100200",
            text: "hedged",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"chat_id": "-100200", "text": "hedged"}));
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        let notifier = from_config(None).unwrap();
        notifier.notify("test alert").await;
    }
}
