//! Core domain types: metadata, candidate snippets, model types, and the
//! page/model documents written to disk.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CmsExtractError;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Page-level metadata with a fixed key set. Missing values are empty strings,
/// so the serialized object always carries every key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub title: String,
    pub description: String,
    pub canonical: String,
    #[serde(rename = "og:title")]
    pub og_title: String,
    #[serde(rename = "og:description")]
    pub og_description: String,
    #[serde(rename = "og:image")]
    pub og_image: String,
    #[serde(rename = "og:url")]
    pub og_url: String,
    #[serde(rename = "og:type")]
    pub og_type: String,
    #[serde(rename = "og:site_name")]
    pub og_site_name: String,
    #[serde(rename = "twitter:card")]
    pub twitter_card: String,
    #[serde(rename = "twitter:title")]
    pub twitter_title: String,
    #[serde(rename = "twitter:description")]
    pub twitter_description: String,
    #[serde(rename = "twitter:image")]
    pub twitter_image: String,
}

impl Metadata {
    /// Every key, in serialization order.
    pub const KEYS: [&'static str; 13] = [
        "title",
        "description",
        "canonical",
        "og:title",
        "og:description",
        "og:image",
        "og:url",
        "og:type",
        "og:site_name",
        "twitter:card",
        "twitter:title",
        "twitter:description",
        "twitter:image",
    ];

    /// Look up a value by its serialized key. Unknown keys yield `None`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.slot(key).map(|s| s.as_str())
    }

    /// Mutable access by serialized key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut String> {
        Some(match key {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "canonical" => &mut self.canonical,
            "og:title" => &mut self.og_title,
            "og:description" => &mut self.og_description,
            "og:image" => &mut self.og_image,
            "og:url" => &mut self.og_url,
            "og:type" => &mut self.og_type,
            "og:site_name" => &mut self.og_site_name,
            "twitter:card" => &mut self.twitter_card,
            "twitter:title" => &mut self.twitter_title,
            "twitter:description" => &mut self.twitter_description,
            "twitter:image" => &mut self.twitter_image,
            _ => return None,
        })
    }

    fn slot(&self, key: &str) -> Option<&String> {
        Some(match key {
            "title" => &self.title,
            "description" => &self.description,
            "canonical" => &self.canonical,
            "og:title" => &self.og_title,
            "og:description" => &self.og_description,
            "og:image" => &self.og_image,
            "og:url" => &self.og_url,
            "og:type" => &self.og_type,
            "og:site_name" => &self.og_site_name,
            "twitter:card" => &self.twitter_card,
            "twitter:title" => &self.twitter_title,
            "twitter:description" => &self.twitter_description,
            "twitter:image" => &self.twitter_image,
            _ => return None,
        })
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        Self::KEYS
            .iter()
            .all(|k| self.get(k).is_none_or(str::is_empty))
    }
}

// ---------------------------------------------------------------------------
// Candidate snippets
// ---------------------------------------------------------------------------

/// Provisional structural kind assigned by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetKind {
    /// Hero/banner-like block (prominent image + heading).
    Banner,
    /// `<h1>`/`<h2>` heading.
    Heading,
    /// Substantial body paragraph.
    Paragraph,
    /// Repeated image + short text block.
    Card,
}

impl SnippetKind {
    /// Label passed to the classification oracle.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::Card => "card",
        }
    }
}

impl std::fmt::Display for SnippetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A DOM fragment extracted from the page, prior to classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSnippet {
    pub kind: SnippetKind,
    /// Heading text associated with the fragment (may be empty).
    #[serde(default)]
    pub heading: String,
    /// Whitespace-collapsed text content.
    #[serde(default)]
    pub text: String,
    /// Absolute (when resolvable) image URL.
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub image_alt: String,
    /// First link target inside the fragment.
    #[serde(default)]
    pub link: String,
}

impl CandidateSnippet {
    /// Snippet of the given kind with only text set.
    pub fn new(kind: SnippetKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            heading: String::new(),
            text: text.into(),
            image_url: String::new(),
            image_alt: String::new(),
            link: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Model types
// ---------------------------------------------------------------------------

/// The closed set of content-model types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Banner,
    Headline,
    Teaser,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [Self::Banner, Self::Headline, Self::Teaser];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::Headline => "headline",
            Self::Teaser => "teaser",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelType {
    type Err = CmsExtractError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "banner" => Ok(Self::Banner),
            "headline" => Ok(Self::Headline),
            "teaser" => Ok(Self::Teaser),
            other => Err(CmsExtractError::validation(format!(
                "unknown model type: {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Reference from a page document to one of its model documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    #[serde(rename = "type")]
    pub model_type: ModelType,
    /// Path relative to the output root, always `/`-separated.
    pub path: String,
}

/// The `pages/<slug>.json` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDocument {
    pub page_url: String,
    pub page_uid: String,
    pub models: Vec<ModelRef>,
    pub metadata: Metadata,
}

/// Ordered string fields of one model document. Serializes as a JSON object
/// whose key order follows the schema table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelFields(pub Vec<(String, String)>);

impl ModelFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for ModelFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// One classified, shaped model ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDocument {
    pub model_type: ModelType,
    /// 1-based position among models of the same type on this page.
    pub ordinal: usize,
    /// Path relative to the output root.
    pub path: String,
    pub fields: ModelFields,
}
