//! The classification oracle seam and reply parsing.

use async_trait::async_trait;

use cmsextract_shared::{CmsExtractError, ModelType, Result, SnippetKind};

/// Snippet text sent to an oracle is cut to this many characters.
pub const PROMPT_TEXT_CHARS: usize = 1000;

/// An external service that assigns a model type to a snippet.
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Classify one snippet given its structural kind and text.
    async fn classify(&self, kind: SnippetKind, text: &str) -> Result<ModelType>;
}

/// Instruction sent to every provider.
pub(crate) const INSTRUCTION: &str = "You help migrate web pages into a headless CMS. \
Each page block must become one content model: \
banner (hero image with title and description), \
headline (a standalone heading), \
or teaser (a card linking to other content with title, short description and image). \
Reply with exactly one word: banner, headline or teaser.";

/// Build the user prompt for one snippet.
pub(crate) fn build_prompt(kind: SnippetKind, text: &str) -> String {
    let text: String = text.chars().take(PROMPT_TEXT_CHARS).collect();
    format!("Block kind: {}\nBlock text:\n{text}", kind.label())
}

/// Parse a model reply into a [`ModelType`].
///
/// Accepts a bare word, a fenced block, or a JSON object with a `type`
/// field. The earliest of `banner`, `headline`, `teaser` in the reply wins.
pub fn parse_model_type(reply: &str) -> Result<ModelType> {
    let trimmed = reply
        .trim()
        .trim_start_matches("```json")
        .trim_matches('`')
        .trim();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(t) = value.get("type").and_then(|t| t.as_str()) {
            return t.trim().to_ascii_lowercase().parse();
        }
    }

    let lower = trimmed.to_ascii_lowercase();
    ModelType::ALL
        .iter()
        .filter_map(|t| lower.find(t.as_str()).map(|pos| (pos, *t)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, t)| t)
        .ok_or_else(|| {
            let preview: String = reply.chars().take(80).collect();
            CmsExtractError::Classification(format!("unrecognised oracle reply: {preview:?}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_word() {
        assert_eq!(parse_model_type("teaser").unwrap(), ModelType::Teaser);
        assert_eq!(parse_model_type("  Banner.\n").unwrap(), ModelType::Banner);
    }

    #[test]
    fn fenced_json() {
        let reply = "```json\n{\"type\": \"headline\"}\n```";
        assert_eq!(parse_model_type(reply).unwrap(), ModelType::Headline);
    }

    #[test]
    fn earliest_mention_wins() {
        let reply = "This is a headline, not a banner.";
        assert_eq!(parse_model_type(reply).unwrap(), ModelType::Headline);
    }

    #[test]
    fn unknown_reply_is_error() {
        assert!(parse_model_type("carousel").is_err());
        assert!(parse_model_type(r#"{"type": "carousel"}"#).is_err());
    }

    #[test]
    fn prompt_truncates_text() {
        let long = "z".repeat(PROMPT_TEXT_CHARS + 50);
        let prompt = build_prompt(SnippetKind::Card, &long);
        assert!(prompt.starts_with("Block kind: card\n"));
        assert_eq!(prompt.matches('z').count(), PROMPT_TEXT_CHARS);
    }
}
