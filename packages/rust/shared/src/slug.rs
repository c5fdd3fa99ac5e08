//! Slug, page uid, and output path derivation.

use std::sync::LazyLock;

use regex::Regex;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Slug used when the source reduces to nothing.
pub const FALLBACK_SLUG: &str = "page";

/// Lower-case the input and collapse every run of non-alphanumeric
/// characters into a single `-`. Leading/trailing separators are dropped.
pub fn slugify(source: &str) -> String {
    let lowered = source.trim().to_lowercase();
    let slug = NON_ALNUM.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// `page_<slug>`.
pub fn page_uid(slug: &str) -> String {
    format!("page_{slug}")
}

/// `pages/<slug>.json`, relative to the output root.
pub fn page_path(slug: &str) -> String {
    format!("pages/{slug}.json")
}

/// `models/<slug>`, relative to the output root.
pub fn model_dir(slug: &str) -> String {
    format!("models/{slug}")
}

/// `<type>_<NNN>.json`.
pub fn model_file_name(model_type: &str, ordinal: usize) -> String {
    format!("{model_type}_{ordinal:03}.json")
}

/// `models/<slug>/<type>_<NNN>.json`, relative to the output root.
pub fn model_path(slug: &str, model_type: &str, ordinal: usize) -> String {
    format!("{}/{}", model_dir(slug), model_file_name(model_type, ordinal))
}
