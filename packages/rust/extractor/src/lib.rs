//! HTML extraction: page metadata and the ordered candidate snippets the
//! classifier and assembler work from.

pub mod decode;
pub mod metadata;
pub mod snippets;
mod text;

use scraper::Html;
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use cmsextract_shared::{CandidateSnippet, ExtractOptions, Metadata};

pub use decode::decode_document;
pub use metadata::extract_metadata;
pub use snippets::extract_snippets;

/// Everything pulled out of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub metadata: Metadata,
    pub snippets: Vec<CandidateSnippet>,
}

/// Parse `html` and extract metadata plus snippets.
///
/// Empty or whitespace-only input yields empty metadata and no snippets.
/// Relative image and link URLs are resolved against `base` when given.
#[instrument(skip_all, fields(bytes = html.len()))]
pub fn extract(html: &str, base: Option<&Url>, opts: &ExtractOptions) -> Extraction {
    if html.trim().is_empty() {
        debug!("empty document");
        return Extraction::default();
    }

    let doc = Html::parse_document(html);
    Extraction {
        metadata: extract_metadata(&doc, base),
        snippets: extract_snippets(&doc, base, opts),
    }
}
