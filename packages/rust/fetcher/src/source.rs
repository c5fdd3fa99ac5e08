//! Pipeline inputs and the fetched source document.

use std::path::{Path, PathBuf};

use url::Url;

use cmsextract_shared::slug::slugify;
use cmsextract_shared::{CmsExtractError, Result};

/// One page worth of input: a URL to render, a local HTML file, or an
/// uploaded/archived document held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    Url(Url),
    File(PathBuf),
    Html { name: String, bytes: Vec<u8> },
}

impl SourceInput {
    /// Interpret a command-line source string.
    ///
    /// An existing path wins over URL parsing. Only `http`/`https` URLs are
    /// accepted; anything else is a fetch error.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CmsExtractError::fetch(raw, "empty source"));
        }

        if Path::new(raw).exists() {
            return Ok(Self::File(PathBuf::from(raw)));
        }

        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Url(url)),
            Ok(url) => Err(CmsExtractError::fetch(
                raw,
                format!("unsupported scheme: {}", url.scheme()),
            )),
            Err(_) => Err(CmsExtractError::fetch(raw, "no such file and not a URL")),
        }
    }

    /// Inline document (uploaded file, archive entry).
    pub fn html(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Html {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Human-readable label for logs and reports.
    pub fn label(&self) -> String {
        match self {
            Self::Url(url) => url.to_string(),
            Self::File(path) => path.display().to_string(),
            Self::Html { name, .. } => name.clone(),
        }
    }

    /// Value recorded as `page_url` in the page document.
    pub fn page_url(&self) -> String {
        self.label()
    }

    /// Slug derived from the URL, or from the file name for local and inline
    /// documents.
    pub fn slug(&self) -> String {
        match self {
            Self::Url(url) => slugify(url.as_str()),
            Self::File(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                slugify(&name)
            }
            Self::Html { name, .. } => {
                let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
                slugify(base)
            }
        }
    }

    /// Base URL for resolving relative links, when the source has one.
    pub fn base_url(&self) -> Option<&Url> {
        match self {
            Self::Url(url) => Some(url),
            _ => None,
        }
    }
}

/// Raw bytes of a source document plus where they came from. Immutable once
/// fetched.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Source label (URL or file name).
    pub origin: String,
    /// Page URL used as the base for relative links.
    pub page_url: Option<Url>,
    pub body: Vec<u8>,
    /// Transport `Content-Type`, if the document came over the network.
    pub content_type: Option<String>,
    /// Rendering engine that produced the body; `None` for local input.
    pub engine: Option<String>,
}
