//! Candidate snippet extraction.
//!
//! Heuristics run in a fixed priority order (banner, heading, paragraph,
//! card). Within a kind, snippets follow document order; each kind has its
//! own cap and the whole sequence is capped again after de-duplication.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use cmsextract_shared::{CandidateSnippet, ExtractOptions, SnippetKind};

use crate::text::{image_src, resolve_url, sel, truncate_chars, visible_text};

static HERO: LazyLock<Selector> = LazyLock::new(|| {
    sel(r#".hero, .banner, [role="banner"], header, [class*="hero"], [class*="banner"]"#)
});
static IMG: LazyLock<Selector> = LazyLock::new(|| sel("img"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| sel("a[href]"));
static TOP_HEADING: LazyLock<Selector> = LazyLock::new(|| sel("h1, h2"));
static ANY_HEADING: LazyLock<Selector> = LazyLock::new(|| sel("h1, h2, h3, h4, h5, h6"));
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| sel("p"));
static CARD_CLASS: LazyLock<Selector> = LazyLock::new(|| sel(".card, .teaser, .tile"));

const BANNER_TEXT_CHARS: usize = 2000;
const HEADING_TEXT_CHARS: usize = 600;
const PARAGRAPH_TEXT_CHARS: usize = 800;
const CARD_TEXT_CHARS: usize = 600;

/// Repeated sibling blocks with more text than this are content, not cards.
const MAX_CARD_TEXT_CHARS: usize = 300;

/// Prefix length used to detect duplicate snippets.
const DEDUP_PREFIX_CHARS: usize = 80;

/// Extract the bounded, ordered candidate sequence.
pub fn extract_snippets(
    doc: &Html,
    base: Option<&Url>,
    opts: &ExtractOptions,
) -> Vec<CandidateSnippet> {
    let mut candidates = Vec::new();
    candidates.extend(banner(doc, base));
    candidates.extend(headings(doc, opts.max_headings));
    candidates.extend(paragraphs(doc, opts.max_paragraphs, opts.min_paragraph_chars));
    candidates.extend(cards(doc, base, opts.max_cards));

    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for snippet in candidates {
        let key = (
            snippet.kind,
            truncate_chars(&snippet.text, DEDUP_PREFIX_CHARS),
            snippet.image_url.clone(),
        );
        if !seen.insert(key) {
            continue;
        }
        unique.push(snippet);
        if unique.len() >= opts.max_snippets {
            break;
        }
    }

    debug!(count = unique.len(), "snippets extracted");
    unique
}

// ---------------------------------------------------------------------------
// Banner
// ---------------------------------------------------------------------------

/// First hero/banner container holding an image or heading; otherwise the
/// first image paired with the first top-level heading.
fn banner(doc: &Html, base: Option<&Url>) -> Option<CandidateSnippet> {
    for el in doc.select(&HERO) {
        let has_image = first_image(el).is_some();
        let heading = el.select(&ANY_HEADING).next().map(visible_text);
        if !has_image && heading.as_deref().is_none_or(str::is_empty) {
            continue;
        }

        let mut snippet = block_snippet(SnippetKind::Banner, el, base, BANNER_TEXT_CHARS);
        snippet.heading = heading.unwrap_or_default();
        return Some(snippet);
    }

    let img = doc.select(&IMG).find(|img| image_src(*img).is_some())?;
    let heading = doc
        .select(&TOP_HEADING)
        .map(visible_text)
        .find(|t| !t.is_empty())?;

    let mut snippet = CandidateSnippet::new(SnippetKind::Banner, truncate_chars(&heading, BANNER_TEXT_CHARS));
    snippet.heading = heading;
    set_image(&mut snippet, img, base);
    Some(snippet)
}

// ---------------------------------------------------------------------------
// Headings and paragraphs
// ---------------------------------------------------------------------------

fn headings(doc: &Html, cap: usize) -> Vec<CandidateSnippet> {
    doc.select(&TOP_HEADING)
        .map(visible_text)
        .filter(|t| !t.is_empty())
        .take(cap)
        .map(|text| {
            let mut snippet =
                CandidateSnippet::new(SnippetKind::Heading, truncate_chars(&text, HEADING_TEXT_CHARS));
            snippet.heading = text;
            snippet
        })
        .collect()
}

fn paragraphs(doc: &Html, cap: usize, min_chars: usize) -> Vec<CandidateSnippet> {
    doc.select(&PARAGRAPH)
        .map(visible_text)
        .filter(|t| t.chars().count() >= min_chars.max(1))
        .take(cap)
        .map(|text| {
            CandidateSnippet::new(SnippetKind::Paragraph, truncate_chars(&text, PARAGRAPH_TEXT_CHARS))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// Card-classed elements plus repeated sibling blocks (same tag and class)
/// that each carry an image and short text. Cards nested inside an already
/// taken card are skipped.
fn cards(doc: &Html, base: Option<&Url>, cap: usize) -> Vec<CandidateSnippet> {
    let mut repeated = HashSet::new();
    for node in doc.root_element().descendants() {
        let Some(parent) = ElementRef::wrap(node) else {
            continue;
        };
        for members in sibling_groups(parent).values().filter(|m| m.len() >= 2) {
            repeated.extend(members.iter().filter(|c| looks_like_card(**c)).map(|c| c.id()));
        }
    }

    let mut taken = HashSet::new();
    let mut out = Vec::new();

    for node in doc.root_element().descendants() {
        if out.len() >= cap {
            break;
        }
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        if !CARD_CLASS.matches(&el) && !repeated.contains(&el.id()) {
            continue;
        }
        if el.ancestors().any(|a| taken.contains(&a.id())) {
            continue;
        }

        let mut snippet = block_snippet(SnippetKind::Card, el, base, CARD_TEXT_CHARS);
        if snippet.text.is_empty() && snippet.image_url.is_empty() {
            continue;
        }
        snippet.heading = el
            .select(&ANY_HEADING)
            .next()
            .or_else(|| el.select(&ANCHOR).next())
            .map(visible_text)
            .unwrap_or_default();

        taken.insert(el.id());
        out.push(snippet);
    }

    out
}

/// Element children of `parent` grouped by tag+class signature.
fn sibling_groups(parent: ElementRef<'_>) -> HashMap<(String, String), Vec<ElementRef<'_>>> {
    let mut groups: HashMap<_, Vec<_>> = HashMap::new();
    for child in parent.children().filter_map(ElementRef::wrap) {
        let signature = (
            child.value().name().to_string(),
            child.value().attr("class").unwrap_or_default().trim().to_string(),
        );
        groups.entry(signature).or_default().push(child);
    }
    groups
}

fn looks_like_card(el: ElementRef<'_>) -> bool {
    if first_image(el).is_none() {
        return false;
    }
    let len = visible_text(el).chars().count();
    (1..=MAX_CARD_TEXT_CHARS).contains(&len)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn first_image(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.select(&IMG).find(|img| image_src(*img).is_some())
}

fn set_image(snippet: &mut CandidateSnippet, img: ElementRef<'_>, base: Option<&Url>) {
    snippet.image_url = image_src(img)
        .map(|src| resolve_url(base, src))
        .unwrap_or_default();
    snippet.image_alt = img.value().attr("alt").unwrap_or_default().trim().to_string();
}

/// Snippet built from a container: text, first image, first link.
fn block_snippet(
    kind: SnippetKind,
    el: ElementRef<'_>,
    base: Option<&Url>,
    max_chars: usize,
) -> CandidateSnippet {
    let mut snippet = CandidateSnippet::new(kind, truncate_chars(&visible_text(el), max_chars));
    if let Some(img) = first_image(el) {
        set_image(&mut snippet, img, base);
    }
    if let Some(href) = el.select(&ANCHOR).next().and_then(|a| a.value().attr("href")) {
        snippet.link = resolve_url(base, href);
    }
    snippet
}
