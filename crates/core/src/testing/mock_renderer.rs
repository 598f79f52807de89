//! Mock page renderer for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::renderer::{PageRenderer, RenderError, RenderedPage};

/// Mock implementation of the PageRenderer trait.
///
/// Serves configured documents per URL, records requested URLs and can fail
/// chosen URLs. Unknown URLs render as an empty document.
#[derive(Debug, Default)]
pub struct MockRenderer {
    pages: Arc<RwLock<HashMap<String, String>>>,
    failures: Arc<RwLock<HashMap<String, RenderError>>>,
    redirects: Arc<RwLock<HashMap<String, String>>>,
    requests: Arc<RwLock<Vec<String>>>,
}

impl MockRenderer {
    /// Create a renderer with no pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `document` for `url`, replacing any previous page or failure.
    pub async fn set_page(&self, url: &str, document: String) {
        self.failures.write().await.remove(url);
        self.pages.write().await.insert(url.to_string(), document);
    }

    /// Fail every render of `url` with `error`.
    pub async fn fail_url(&self, url: &str, error: RenderError) {
        self.failures.write().await.insert(url.to_string(), error);
    }

    /// Report `final_url` as where renders of `url` ended up.
    pub async fn redirect(&self, url: &str, final_url: &str) {
        self.redirects
            .write()
            .await
            .insert(url.to_string(), final_url.to_string());
    }

    /// URLs rendered so far, in order.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        self.requests.write().await.push(url.to_string());

        if let Some(error) = self.failures.read().await.get(url) {
            return Err(error.clone());
        }

        let document = self
            .pages
            .read()
            .await
            .get(url)
            .cloned()
            .unwrap_or_default();
        let final_url = self
            .redirects
            .read()
            .await
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        Ok(RenderedPage::new(document, final_url))
    }
}
