//! Headless Chromium renderer. Executes client-side scripts before reading
//! the DOM, so it is the primary engine when the `browser` feature is on.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tracing::{debug, warn};
use url::Url;

use cmsextract_shared::{CmsExtractError, Result};

use crate::renderer::{Rendered, Renderer};

/// Launches a fresh headless browser per render.
pub struct BrowserRenderer {
    timeout: Duration,
}

impl BrowserRenderer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Renderer for BrowserRenderer {
    fn name(&self) -> &str {
        "browser"
    }

    async fn render(&self, url: &Url) -> Result<Rendered> {
        let err = |msg: String| CmsExtractError::fetch(url.as_str(), msg);

        let config = BrowserConfig::builder()
            .request_timeout(self.timeout)
            .build()
            .map_err(|e| err(format!("browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| err(format!("browser launch failed: {e}")))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!(%url, "rendering in headless browser");
        let rendered = async {
            let page = browser.new_page(url.as_str()).await?;
            page.wait_for_navigation().await?;
            page.content().await
        }
        .await;

        if let Err(e) = browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        let _ = browser.wait().await;
        events.abort();

        // The DOM is serialized as UTF-8 whatever the page declared.
        rendered
            .map(|html| Rendered::new(html.into_bytes(), Some("text/html; charset=utf-8".into())))
            .map_err(|e| err(format!("render failed: {e}")))
    }
}
