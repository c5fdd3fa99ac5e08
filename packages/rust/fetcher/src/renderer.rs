//! Rendering strategies. Each one turns a URL into HTML bytes; the
//! [`Fetcher`](crate::Fetcher) tries them in order.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use cmsextract_shared::{CmsExtractError, Result};

/// HTML bytes produced by a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub body: Vec<u8>,
    /// `Content-Type` the body was delivered with, when the engine knows it.
    /// Its charset takes precedence over one declared in the markup.
    pub content_type: Option<String>,
}

impl Rendered {
    pub fn new(body: Vec<u8>, content_type: Option<String>) -> Self {
        Self { body, content_type }
    }
}

/// A way of obtaining the HTML of a page.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Engine name used in config and logs.
    fn name(&self) -> &str;

    /// Render the page and return its HTML.
    async fn render(&self, url: &Url) -> Result<Rendered>;
}

/// Plain HTTP GET. Cannot execute scripts, so it serves as the secondary
/// engine behind the browser.
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| CmsExtractError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    fn name(&self) -> &str {
        "http"
    }

    async fn render(&self, url: &Url) -> Result<Rendered> {
        debug!(%url, "fetching over HTTP");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| CmsExtractError::fetch(url.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CmsExtractError::fetch(url.as_str(), format!("HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response
            .bytes()
            .await
            .map_err(|e| CmsExtractError::fetch(url.as_str(), format!("body read failed: {e}")))?;

        Ok(Rendered::new(body.to_vec(), content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn http_renderer_returns_body() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/page"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string("<h1>Rendered</h1>"),
            )
            .mount(&server)
            .await;

        let renderer = HttpRenderer::new("test-agent", Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let rendered = renderer.render(&url).await.unwrap();
        assert_eq!(rendered.body, b"<h1>Rendered</h1>");
    }

    #[tokio::test]
    async fn http_renderer_keeps_content_type() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=iso-8859-1")
                    .set_body_bytes(b"<p>Caf\xE9</p>".to_vec()),
            )
            .mount(&server)
            .await;

        let renderer = HttpRenderer::new("test-agent", Duration::from_secs(5)).unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let rendered = renderer.render(&url).await.unwrap();
        assert_eq!(rendered.body, b"<p>Caf\xE9</p>");
        assert_eq!(
            rendered.content_type.as_deref(),
            Some("text/html; charset=iso-8859-1")
        );
    }

    #[tokio::test]
    async fn http_renderer_rejects_error_status() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/missing"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let renderer = HttpRenderer::new("test-agent", Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = renderer.render(&url).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
