//! Small DOM and text helpers shared by the extractors.

use scraper::{ElementRef, Selector};
use url::Url;

/// Compile a static selector.
pub(crate) fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Collapse all whitespace runs into single spaces and trim.
pub(crate) fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters (not bytes).
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].trim_end().to_string(),
        None => s.to_string(),
    }
}

/// Text content of an element, skipping script-like children, with
/// whitespace collapsed.
pub(crate) fn visible_text(el: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|p| matches!(p.value().name(), "script" | "style" | "noscript" | "template"));
        if !hidden {
            parts.push(&**text);
        }
    }
    collapse_ws(&parts.join(" "))
}

/// Resolve `href` against `base` when it is relative and a base is known.
pub(crate) fn resolve_url(base: Option<&Url>, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || Url::parse(href).is_ok() {
        return href.to_string();
    }
    match base.and_then(|b| b.join(href).ok()) {
        Some(resolved) => resolved.to_string(),
        None => href.to_string(),
    }
}

/// `src` of an `<img>`, falling back to the common lazy-loading attribute.
pub(crate) fn image_src<'a>(img: ElementRef<'a>) -> Option<&'a str> {
    let attrs = img.value();
    attrs
        .attr("src")
        .filter(|s| !s.trim().is_empty())
        .or_else(|| attrs.attr("data-src"))
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::*;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate_chars("héllo world", 5), "héllo");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn visible_text_skips_scripts() {
        let doc = Html::parse_fragment(
            "<div>Hello <script>var x = 1;</script><b>there</b>\n\n friend</div>",
        );
        let div = doc.select(&sel("div")).next().unwrap();
        assert_eq!(visible_text(div), "Hello there friend");
    }

    #[test]
    fn resolve_relative_and_absolute() {
        let base = Url::parse("https://example.com/news/item").unwrap();
        assert_eq!(resolve_url(Some(&base), "a.jpg"), "https://example.com/news/a.jpg");
        assert_eq!(resolve_url(Some(&base), "https://cdn.x/b.jpg"), "https://cdn.x/b.jpg");
        assert_eq!(resolve_url(None, "a.jpg"), "a.jpg");
    }
}
