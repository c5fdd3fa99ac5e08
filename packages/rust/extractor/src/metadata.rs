//! `<head>` metadata extraction.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use cmsextract_shared::Metadata;

use crate::text::{collapse_ws, resolve_url, sel};

static TITLE: LazyLock<Selector> = LazyLock::new(|| sel("title"));
static META: LazyLock<Selector> = LazyLock::new(|| sel("meta"));
static LINK_REL: LazyLock<Selector> = LazyLock::new(|| sel("link[rel][href]"));

/// Keys whose values are URLs and get resolved against the page URL.
const URL_KEYS: [&str; 4] = ["canonical", "og:image", "og:url", "twitter:image"];

/// Extract the fixed metadata key set. Never fails; absent keys stay empty.
/// The first non-empty match for a key wins.
pub fn extract_metadata(doc: &Html, base: Option<&Url>) -> Metadata {
    let mut meta = Metadata::default();

    if let Some(title) = doc.select(&TITLE).next() {
        meta.title = collapse_ws(&title.text().collect::<String>());
    }

    if let Some(link) = doc.select(&LINK_REL).find(|el| {
        el.value()
            .attr("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("canonical")))
    }) {
        meta.canonical = link.value().attr("href").unwrap_or_default().trim().to_string();
    }

    for el in doc.select(&META) {
        let attrs = el.value();
        let Some(key) = attrs.attr("property").or_else(|| attrs.attr("name")) else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let content = attrs.attr("content").unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }

        if let Some(slot) = meta.get_mut(&key) {
            if slot.is_empty() {
                *slot = content.to_string();
            }
        }
    }

    if let Some(base) = base {
        for key in URL_KEYS {
            if let Some(slot) = meta.get_mut(key) {
                if !slot.is_empty() {
                    *slot = resolve_url(Some(base), slot);
                }
            }
        }
    }

    meta
}
