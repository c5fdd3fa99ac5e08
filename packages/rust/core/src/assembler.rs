//! Document assembly: classified snippets → one page document plus one model
//! document per snippet, shaped by the schema table.

use std::collections::HashMap;

use tracing::debug;

use cmsextract_shared::schema::{FieldSource, FieldSpec, schema_for};
use cmsextract_shared::slug::{model_path, page_uid};
use cmsextract_shared::{
    CandidateSnippet, Metadata, ModelDocument, ModelFields, ModelRef, ModelType, PageDocument,
};

/// Separators after which a trailing site or brand name is dropped.
const BRAND_SEPARATORS: [&str; 3] = [" | ", " – ", " — "];

/// Length of the text stand-in when a headline snippet has no heading.
const HEADLINE_FROM_TEXT_CHARS: usize = 120;

/// A snippet with its assigned model type.
#[derive(Debug, Clone)]
pub struct ClassifiedSnippet {
    pub snippet: CandidateSnippet,
    pub model_type: ModelType,
}

/// Everything the writer needs for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub slug: String,
    pub page: PageDocument,
    pub models: Vec<ModelDocument>,
}

/// Build the page and model documents.
///
/// Ordinals count per type in encounter order, starting at 1. The page's
/// `models` list follows snippet order, not grouped by type, so types the
/// oracle interleaves stay interleaved; within each type that order is the
/// ordinal order. It references exactly the paths of the returned model
/// documents.
pub fn assemble(
    slug: &str,
    page_url: &str,
    metadata: Metadata,
    classified: &[ClassifiedSnippet],
) -> Assembly {
    let mut counters: HashMap<ModelType, usize> = HashMap::new();
    let mut models = Vec::with_capacity(classified.len());

    for item in classified {
        let ordinal = {
            let n = counters.entry(item.model_type).or_default();
            *n += 1;
            *n
        };
        let ctx = ShapeContext {
            slug,
            model_type: item.model_type,
            ordinal,
            metadata: &metadata,
        };
        models.push(ModelDocument {
            model_type: item.model_type,
            ordinal,
            path: model_path(slug, item.model_type.as_str(), ordinal),
            fields: shape(&item.snippet, &ctx),
        });
    }

    let page = PageDocument {
        page_url: page_url.to_string(),
        page_uid: page_uid(slug),
        models: models
            .iter()
            .map(|m| ModelRef {
                model_type: m.model_type,
                path: m.path.clone(),
            })
            .collect(),
        metadata,
    };

    debug!(%slug, models = models.len(), "page assembled");

    Assembly {
        slug: slug.to_string(),
        page,
        models,
    }
}

// ---------------------------------------------------------------------------
// Field shaping
// ---------------------------------------------------------------------------

struct ShapeContext<'a> {
    slug: &'a str,
    model_type: ModelType,
    ordinal: usize,
    metadata: &'a Metadata,
}

/// Map a snippet onto its type's schema. Every schema field is present.
fn shape(snippet: &CandidateSnippet, ctx: &ShapeContext<'_>) -> ModelFields {
    let fields = schema_for(ctx.model_type)
        .fields
        .iter()
        .map(|spec| (spec.name.to_string(), field_value(spec, snippet, ctx)))
        .collect();
    ModelFields(fields)
}

fn field_value(spec: &FieldSpec, snippet: &CandidateSnippet, ctx: &ShapeContext<'_>) -> String {
    let value = match spec.source {
        FieldSource::Heading => snippet.heading.clone(),
        FieldSource::CleanHeading => {
            if snippet.heading.is_empty() {
                clean_headline(&truncate_words(&snippet.text, HEADLINE_FROM_TEXT_CHARS))
            } else {
                clean_headline(&snippet.heading)
            }
        }
        FieldSource::HeadingOrText(n) => {
            if snippet.heading.is_empty() {
                truncate_words(&snippet.text, n)
            } else {
                snippet.heading.clone()
            }
        }
        FieldSource::Summary(n) => truncate_words(body_text(snippet), n),
        FieldSource::ImageUrl => snippet.image_url.clone(),
        FieldSource::ImageAlt => snippet.image_alt.clone(),
        FieldSource::ImageAltOrHeading => {
            if snippet.image_alt.is_empty() && !snippet.image_url.is_empty() {
                snippet.heading.clone()
            } else {
                snippet.image_alt.clone()
            }
        }
        FieldSource::Link => snippet.link.clone(),
        FieldSource::TypeName => ctx.model_type.as_str().to_string(),
        FieldSource::DisplayType => {
            let layout = if snippet.image_url.is_empty() { "compact" } else { "image_left" };
            layout.to_string()
        }
        FieldSource::Uid => format!("{}_{}_{:03}", ctx.slug, ctx.model_type, ctx.ordinal),
        FieldSource::Unmapped => String::new(),
    };

    if !value.is_empty() {
        return value;
    }

    spec.meta_fallback
        .and_then(|key| ctx.metadata.get(key))
        .filter(|v| !v.is_empty())
        .map(|v| match spec.source {
            FieldSource::CleanHeading => clean_headline(v),
            FieldSource::Summary(n) => truncate_words(v, n),
            _ => v.to_string(),
        })
        .unwrap_or_else(|| spec.default.to_string())
}

/// Snippet text with a leading copy of the heading removed.
fn body_text(snippet: &CandidateSnippet) -> &str {
    if snippet.heading.is_empty() {
        return &snippet.text;
    }
    snippet
        .text
        .strip_prefix(snippet.heading.as_str())
        .map(str::trim_start)
        .unwrap_or(&snippet.text)
}

/// Drop a trailing brand after the first separator, keeping the original
/// text when nothing would be left.
pub fn clean_headline(s: &str) -> String {
    let s = s.trim();
    let cut = BRAND_SEPARATORS
        .iter()
        .filter_map(|sep| s.find(sep))
        .min()
        .unwrap_or(s.len());
    let head = s[..cut].trim();
    let kept = if head.is_empty() { s } else { head };
    kept.to_string()
}

/// Shorten to at most `max` characters, breaking on a word boundary and
/// marking the cut with an ellipsis.
pub fn truncate_words(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }

    let hard: String = s.chars().take(max - 1).collect();
    let soft = match hard.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &hard[..idx],
        _ => hard.as_str(),
    };
    format!("{}…", soft.trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == '.'))
}

#[cfg(test)]
mod tests {
    use cmsextract_shared::SnippetKind;

    use super::*;

    fn classified(kind: SnippetKind, model_type: ModelType, text: &str) -> ClassifiedSnippet {
        ClassifiedSnippet {
            snippet: CandidateSnippet::new(kind, text),
            model_type,
        }
    }

    #[test]
    fn ordinals_count_per_type() {
        let items = [
            classified(SnippetKind::Card, ModelType::Teaser, "first"),
            classified(SnippetKind::Heading, ModelType::Headline, "title"),
            classified(SnippetKind::Card, ModelType::Teaser, "second"),
        ];
        let out = assemble("news", "https://example.com/news", Metadata::default(), &items);

        let paths: Vec<_> = out.page.models.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "models/news/teaser_001.json",
                "models/news/headline_001.json",
                "models/news/teaser_002.json",
            ]
        );
        assert_eq!(out.models[2].ordinal, 2);
        assert_eq!(out.models[2].fields.get("uid"), Some("news_teaser_002"));
        assert_eq!(out.page.page_uid, "page_news");
    }

    #[test]
    fn every_schema_field_is_present() {
        let items = [classified(SnippetKind::Paragraph, ModelType::Banner, "")];
        let out = assemble("p", "", Metadata::default(), &items);
        let keys: Vec<_> = out.models[0].fields.keys().collect();
        assert_eq!(keys, ["Title", "url", "alt", "Headline", "Byline", "Description"]);
        assert!(out.models[0].fields.0.iter().all(|(_, v)| v.is_empty()));
    }

    #[test]
    fn banner_prefers_snippet_then_meta() {
        let mut snippet = CandidateSnippet::new(SnippetKind::Banner, "Hi");
        snippet.heading = "Hi".into();
        snippet.image_url = "a.jpg".into();
        snippet.image_alt = "Banner".into();

        let metadata = Metadata {
            title: "Example Domain | ACME".into(),
            description: "An example page.".into(),
            og_title: "OG title".into(),
            ..Metadata::default()
        };
        let items = [ClassifiedSnippet {
            snippet,
            model_type: ModelType::Banner,
        }];
        let out = assemble("x", "", metadata, &items);
        let fields = &out.models[0].fields;

        assert_eq!(fields.get("Title"), Some("Hi"));
        assert_eq!(fields.get("url"), Some("a.jpg"));
        assert_eq!(fields.get("alt"), Some("Banner"));
        assert_eq!(fields.get("Headline"), Some("Hi"));
        assert_eq!(fields.get("Description"), Some("An example page."));
    }

    #[test]
    fn teaser_shaping() {
        let mut snippet = CandidateSnippet::new(SnippetKind::Card, "Read the full story about things.");
        snippet.image_url = "t.jpg".into();
        snippet.heading = "Story".into();
        let items = [ClassifiedSnippet {
            snippet,
            model_type: ModelType::Teaser,
        }];
        let out = assemble("home", "", Metadata::default(), &items);
        let fields = &out.models[0].fields;

        assert_eq!(fields.get("title"), Some("Story"));
        assert_eq!(fields.get("alt_text"), Some("Story"));
        assert_eq!(fields.get("display_type"), Some("image_left"));
        assert_eq!(fields.get("uid"), Some("home_teaser_001"));
    }

    #[test]
    fn headline_from_paragraph_uses_text() {
        let items = [classified(SnippetKind::Paragraph, ModelType::Headline, "Breaking | Daily News")];
        let out = assemble("h", "", Metadata::default(), &items);
        assert_eq!(out.models[0].fields.get("headline_text"), Some("Breaking"));
        assert_eq!(out.models[0].fields.get("content_type_uid"), Some("headline"));
    }

    #[test]
    fn clean_headline_strips_brand() {
        assert_eq!(clean_headline("Spring Sale | ACME"), "Spring Sale");
        assert_eq!(clean_headline("Spring Sale – ACME Store"), "Spring Sale");
        assert_eq!(clean_headline("A — B | C"), "A");
        assert_eq!(clean_headline(" | ACME"), "| ACME");
        assert_eq!(clean_headline("Plain"), "Plain");
    }

    #[test]
    fn truncate_words_respects_limit() {
        let long = "word ".repeat(60);
        let out = truncate_words(&long, 160);
        assert!(out.chars().count() <= 160);
        assert!(out.ends_with("word…"));
        assert_eq!(truncate_words("short", 160), "short");
    }

    #[test]
    fn empty_input_gives_empty_page() {
        let out = assemble("page", "", Metadata::default(), &[]);
        assert!(out.page.models.is_empty());
        assert!(out.models.is_empty());
    }
}
