//! Outbound notification of new listings.

mod format;
mod telegram;

pub use format::{escape_html, format_aggregated, format_messages, SearchSummary, MESSAGE_LIMIT};
pub use telegram::TelegramNotifier;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::{NotifierBackend, NotifierConfig};
use crate::listing::Listing;

/// Errors that can occur when sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notifier not configured: {0}")]
    NotConfigured(String),

    #[error("Notification request timed out")]
    Timeout,

    #[error("Notification request failed: {0}")]
    Request(String),

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// New listings found for one search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchAlert {
    pub search_url: String,
    pub listings: Vec<Listing>,
}

impl SearchAlert {
    pub fn new(search_url: impl Into<String>, listings: Vec<Listing>) -> Self {
        Self {
            search_url: search_url.into(),
            listings,
        }
    }
}

/// Total listings across alerts.
pub fn total_listings(alerts: &[SearchAlert]) -> usize {
    alerts.iter().map(|a| a.listings.len()).sum()
}

/// Delivers one aggregated notification per run.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifier name for logging.
    fn name(&self) -> &str;

    /// Send the batch. Alerts without listings are skipped; an empty batch
    /// sends nothing.
    async fn notify(&self, alerts: &[SearchAlert]) -> Result<(), NotifyError>;
}

/// Create a notifier from configuration.
pub fn create_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config.backend {
        NotifierBackend::Telegram => {
            let telegram = config.telegram.as_ref().ok_or_else(|| {
                NotifyError::NotConfigured("notifier.telegram section missing".to_string())
            })?;
            Ok(Arc::new(TelegramNotifier::new(telegram)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramConfig;
    use crate::testing::fixtures;

    #[test]
    fn test_create_telegram_notifier() {
        let config = NotifierConfig {
            backend: NotifierBackend::Telegram,
            telegram: Some(TelegramConfig {
                bot_token: "123:abc".to_string(),
                chat_id: "42".to_string(),
                api_base: "https://api.telegram.org".to_string(),
                timeout_secs: 5,
            }),
        };
        let notifier = create_notifier(&config).unwrap();
        assert_eq!(notifier.name(), "telegram");
    }

    #[test]
    fn test_create_notifier_requires_section() {
        let config = NotifierConfig {
            backend: NotifierBackend::Telegram,
            telegram: None,
        };
        assert!(matches!(
            create_notifier(&config),
            Err(NotifyError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_total_listings() {
        let alerts = vec![
            SearchAlert::new("a", fixtures::listings(&["1", "2"])),
            SearchAlert::new("b", Vec::new()),
            SearchAlert::new("c", fixtures::listings(&["3"])),
        ];
        assert_eq!(total_listings(&alerts), 3);
    }
}
