//! Telegram Bot API notifier.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TelegramConfig;
use crate::metrics;

use super::format::{format_messages, MESSAGE_LIMIT};
use super::{total_listings, Notifier, NotifyError, SearchAlert};

/// Sends aggregated alerts to one chat via `sendMessage`.
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    /// Create a new notifier with the given configuration.
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
            chat_id: config.chat_id.clone(),
        })
    }

    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout
                } else {
                    // The endpoint embeds the bot token
                    NotifyError::Request(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        let body: TelegramResponse = response.json().await.map_err(|e| {
            NotifyError::Request(format!(
                "HTTP {}: unreadable response: {}",
                status,
                e.without_url()
            ))
        })?;

        if !body.ok {
            return Err(NotifyError::Rejected(
                body.description
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, alerts: &[SearchAlert]) -> Result<(), NotifyError> {
        let messages = format_messages(alerts, MESSAGE_LIMIT);
        if messages.is_empty() {
            debug!("Nothing to notify");
            return Ok(());
        }

        for (i, message) in messages.iter().enumerate() {
            let result = self.send_message(message).await;
            let status = if result.is_ok() { "sent" } else { "failed" };
            metrics::NOTIFICATIONS.with_label_values(&[status]).inc();
            result?;
            debug!(part = i + 1, parts = messages.len(), "Telegram message sent");
        }

        info!(
            listings = total_listings(alerts),
            messages = messages.len(),
            "Telegram notification sent"
        );
        Ok(())
    }
}
