//! Fetcher: resolves a [`SourceInput`] into a [`SourceDocument`].
//!
//! Local and inline inputs are returned unchanged. URLs go through an ordered
//! list of renderers, each bounded by the same hard ceiling; the first one to
//! succeed wins and a fetch error is raised only when every one has failed.

use std::time::Duration;

use tracing::{info, instrument, warn};
use url::Url;

use cmsextract_shared::{CmsExtractError, PipelineConfig, Result};

use crate::renderer::{HttpRenderer, Rendered, Renderer};
use crate::source::{SourceDocument, SourceInput};

/// Ordered rendering strategies plus the per-attempt ceiling.
pub struct Fetcher {
    renderers: Vec<Box<dyn Renderer>>,
    ceiling: Duration,
}

impl Fetcher {
    /// Create a fetcher from explicit renderers.
    pub fn new(renderers: Vec<Box<dyn Renderer>>, ceiling: Duration) -> Self {
        Self { renderers, ceiling }
    }

    /// Build the renderer list named in `config.engines`.
    ///
    /// `"browser"` is skipped with a warning when the crate was built without
    /// the `browser` feature.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let ceiling = Duration::from_secs(config.fetch_timeout_secs);
        let mut renderers: Vec<Box<dyn Renderer>> = Vec::new();

        for name in &config.engines {
            match name.as_str() {
                "http" => renderers.push(Box::new(HttpRenderer::new(&config.user_agent, ceiling)?)),
                "browser" => {
                    #[cfg(feature = "browser")]
                    renderers.push(Box::new(crate::browser::BrowserRenderer::new(ceiling)));
                    #[cfg(not(feature = "browser"))]
                    warn!("browser engine requested but not compiled in, skipping");
                }
                other => {
                    return Err(CmsExtractError::config(format!(
                        "unknown rendering engine '{other}': expected 'browser' or 'http'"
                    )));
                }
            }
        }

        if renderers.is_empty() {
            return Err(CmsExtractError::config("no rendering engine available"));
        }

        Ok(Self::new(renderers, ceiling))
    }

    /// Names of the configured renderers, in try order.
    pub fn renderer_names(&self) -> Vec<&str> {
        self.renderers.iter().map(|r| r.name()).collect()
    }

    /// Obtain the document for `input`.
    #[instrument(skip_all, fields(source = %input.label()))]
    pub async fn fetch(&self, input: &SourceInput) -> Result<SourceDocument> {
        match input {
            SourceInput::File(path) => {
                let body = tokio::fs::read(path).await.map_err(|e| {
                    CmsExtractError::fetch(path.display().to_string(), e.to_string())
                })?;
                Ok(SourceDocument {
                    origin: input.label(),
                    page_url: None,
                    body,
                    content_type: None,
                    engine: None,
                })
            }
            SourceInput::Html { name, bytes } => Ok(SourceDocument {
                origin: name.clone(),
                page_url: None,
                body: bytes.clone(),
                content_type: None,
                engine: None,
            }),
            SourceInput::Url(url) => {
                let (engine, rendered) = self.render(url).await?;
                Ok(SourceDocument {
                    origin: url.to_string(),
                    page_url: Some(url.clone()),
                    body: rendered.body,
                    content_type: rendered.content_type,
                    engine: Some(engine),
                })
            }
        }
    }

    /// Try each renderer in order under the ceiling.
    async fn render(&self, url: &Url) -> Result<(String, Rendered)> {
        let mut failures = Vec::new();

        for renderer in &self.renderers {
            let attempt = tokio::time::timeout(self.ceiling, renderer.render(url)).await;
            match attempt {
                Ok(Ok(rendered)) => {
                    info!(%url, engine = renderer.name(), bytes = rendered.body.len(), "page rendered");
                    return Ok((renderer.name().to_string(), rendered));
                }
                Ok(Err(e)) => {
                    warn!(%url, engine = renderer.name(), error = %e, "renderer failed, trying next");
                    failures.push(format!("{}: {e}", renderer.name()));
                }
                Err(_) => {
                    warn!(%url, engine = renderer.name(), ceiling_secs = self.ceiling.as_secs(), "renderer timed out, trying next");
                    failures.push(format!("{}: timed out", renderer.name()));
                }
            }
        }

        Err(CmsExtractError::fetch(
            url.as_str(),
            format!("all renderers failed ({})", failures.join("; ")),
        ))
    }
}
