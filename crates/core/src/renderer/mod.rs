//! Fetching search result pages.
//!
//! The [`PageRenderer`] trait is the only seam between the pipeline and the
//! upstream site. [`HttpRenderer`] fetches the server-rendered document,
//! which already embeds the deferred-state payload the extractor reads.

mod http;

pub use http::HttpRenderer;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while fetching a page.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Page load timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// A fetched document and where it ended up after redirects.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub document: String,
    pub final_url: String,
    /// Query parameters of `final_url`, in order.
    pub query: Vec<(String, String)>,
}

impl RenderedPage {
    /// Build a page, decoding the query of `final_url`.
    pub fn new(document: impl Into<String>, final_url: impl Into<String>) -> Self {
        let final_url = final_url.into();
        let query = url::Url::parse(&final_url)
            .map(|u| u.query_pairs().into_owned().collect())
            .unwrap_or_default();
        Self {
            document: document.into(),
            final_url,
            query,
        }
    }
}

/// Source of rendered search result documents.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Renderer name for logging.
    fn name(&self) -> &str;

    /// Load `url` and return its document.
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_page_query() {
        let page = RenderedPage::new(
            "<html></html>",
            "https://www.airbnb.co.uk/s/Edinburgh/homes?checkin=2025-08-12&adults=2&adults=3",
        );
        assert_eq!(page.query.len(), 3);
        assert_eq!(page.query[0], ("checkin".to_string(), "2025-08-12".to_string()));
        assert_eq!(page.query[1], ("adults".to_string(), "2".to_string()));
        assert_eq!(page.query[2], ("adults".to_string(), "3".to_string()));
    }

    #[test]
    fn test_rendered_page_unparseable_url() {
        let page = RenderedPage::new("", "not a url");
        assert!(page.query.is_empty());
        assert_eq!(page.final_url, "not a url");
    }
}
