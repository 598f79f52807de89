//! Mock notifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notifier::{Notifier, NotifyError, SearchAlert};

/// Mock implementation of the Notifier trait.
///
/// Records every delivered batch. `set_next_error` makes the next call fail
/// without recording anything.
#[derive(Debug, Default)]
pub struct MockNotifier {
    sent: Arc<RwLock<Vec<Vec<SearchAlert>>>>,
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockNotifier {
    /// Create a notifier with nothing recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches delivered so far.
    pub async fn sent(&self) -> Vec<Vec<SearchAlert>> {
        self.sent.read().await.clone()
    }

    /// Reject the next notification with `message`.
    pub async fn set_next_error(&self, message: &str) {
        *self.next_error.write().await = Some(message.to_string());
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn notify(&self, alerts: &[SearchAlert]) -> Result<(), NotifyError> {
        if let Some(message) = self.next_error.write().await.take() {
            return Err(NotifyError::Rejected(message));
        }
        if alerts.iter().all(|a| a.listings.is_empty()) {
            return Ok(());
        }
        self.sent.write().await.push(alerts.to_vec());
        Ok(())
    }
}
