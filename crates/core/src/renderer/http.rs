//! Plain HTTP page fetcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::RendererConfig;

use super::{PageRenderer, RenderError, RenderedPage};

/// Fetches pages with a browser-like user agent.
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    /// Create a new renderer with the given configuration.
    pub fn new(config: &RendererConfig) -> Result<Self, RenderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .cookie_store(true)
            .build()
            .map_err(|e| RenderError::Network(e.to_string()))?;

        Ok(Self { client })
    }
}

/// Only absolute http(s) URLs are fetchable.
fn parse_target(url: &str) -> Result<Url, RenderError> {
    let parsed = Url::parse(url).map_err(|e| RenderError::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(RenderError::InvalidUrl(format!(
            "{}: unsupported scheme {}",
            url, other
        ))),
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    fn name(&self) -> &str {
        "http"
    }

    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        let target = parse_target(url)?;

        let response = self
            .client
            .get(target)
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .header(ACCEPT_LANGUAGE, "en-GB,en;q=0.9")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RenderError::Timeout
                } else {
                    RenderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let document = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RenderError::Timeout
            } else {
                RenderError::Network(e.to_string())
            }
        })?;

        debug!(url = %final_url, bytes = document.len(), "Fetched page");
        Ok(RenderedPage::new(document, final_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    fn renderer() -> HttpRenderer {
        HttpRenderer::new(&RendererConfig {
            timeout_secs: 5,
            ..RendererConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_parse_target_rejects_bad_urls() {
        assert!(matches!(
            parse_target("not a url"),
            Err(RenderError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_target("ftp://example.com/s/homes"),
            Err(RenderError::InvalidUrl(_))
        ));
        assert!(parse_target("https://www.airbnb.co.uk/s/Edinburgh/homes").is_ok());
    }

    #[tokio::test]
    async fn test_render_returns_document() {
        let base = serve_once("200 OK", "<html><body>results</body></html>").await;
        let url = format!("{}/s/Edinburgh/homes?adults=2", base);

        let page = renderer().render(&url).await.unwrap();
        assert!(page.document.contains("results"));
        assert_eq!(page.final_url, url);
        assert_eq!(page.query, vec![("adults".to_string(), "2".to_string())]);
    }

    #[tokio::test]
    async fn test_render_error_status() {
        let base = serve_once("503 Service Unavailable", "busy").await;
        let result = renderer().render(&format!("{}/s/homes", base)).await;
        assert!(matches!(result, Err(RenderError::Status(503))));
    }

    #[tokio::test]
    async fn test_render_invalid_url() {
        let result = renderer().render("::nope::").await;
        assert!(matches!(result, Err(RenderError::InvalidUrl(_))));
    }
}
