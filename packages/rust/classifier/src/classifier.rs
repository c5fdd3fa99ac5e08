//! Snippet classification with a total, rule-based fallback.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use cmsextract_shared::{CandidateSnippet, CmsExtractError, ModelType, OracleConfig, Result, SnippetKind};

use crate::oracle::ClassificationOracle;
use crate::providers::{ChatOracle, OllamaOracle};

/// Who decided a snippet's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecidedBy {
    Oracle,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub model_type: ModelType,
    pub decided_by: DecidedBy,
}

/// Deterministic rule used whenever the oracle is absent or fails.
pub fn fallback_model_type(kind: SnippetKind) -> ModelType {
    match kind {
        SnippetKind::Banner => ModelType::Banner,
        SnippetKind::Heading => ModelType::Headline,
        SnippetKind::Paragraph | SnippetKind::Card => ModelType::Teaser,
    }
}

/// Maps snippets to model types. Never fails.
#[derive(Clone)]
pub struct Classifier {
    oracle: Option<Arc<dyn ClassificationOracle>>,
    ceiling: Duration,
}

impl Classifier {
    pub fn new(oracle: Option<Arc<dyn ClassificationOracle>>, ceiling: Duration) -> Self {
        Self { oracle, ceiling }
    }

    /// A classifier that only applies the fallback rule.
    pub fn rule_based() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// Build the oracle named by `config.provider`, or none when disabled.
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::rule_based());
        }

        let ceiling = Duration::from_secs(config.timeout_secs);
        let oracle: Arc<dyn ClassificationOracle> = match config.provider.as_str() {
            "ollama" => Arc::new(OllamaOracle::new(&config.endpoint, &config.model, ceiling)?),
            "chat" => {
                let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
                if api_key.is_none() {
                    warn!(env = %config.api_key_env, "no API key set for chat oracle");
                }
                Arc::new(ChatOracle::new(&config.endpoint, &config.model, api_key, ceiling)?)
            }
            other => {
                return Err(CmsExtractError::config(format!(
                    "unknown oracle provider '{other}': expected 'ollama' or 'chat'"
                )));
            }
        };

        Ok(Self::new(Some(oracle), ceiling))
    }

    pub fn oracle_name(&self) -> Option<&str> {
        self.oracle.as_deref().map(|o| o.name())
    }

    pub async fn classify(&self, snippet: &CandidateSnippet) -> Classification {
        let fallback = Classification {
            model_type: fallback_model_type(snippet.kind),
            decided_by: DecidedBy::Fallback,
        };

        let Some(oracle) = &self.oracle else {
            return fallback;
        };

        match tokio::time::timeout(self.ceiling, oracle.classify(snippet.kind, &snippet.text)).await {
            Ok(Ok(model_type)) => {
                debug!(kind = %snippet.kind, %model_type, oracle = oracle.name(), "classified");
                Classification {
                    model_type,
                    decided_by: DecidedBy::Oracle,
                }
            }
            Ok(Err(e)) => {
                warn!(kind = %snippet.kind, error = %e, "oracle failed, using fallback rule");
                fallback
            }
            Err(_) => {
                warn!(kind = %snippet.kind, ceiling_secs = self.ceiling.as_secs(), "oracle timed out, using fallback rule");
                fallback
            }
        }
    }

    /// Classify a whole sequence, keeping its order. Calls are sequential.
    pub async fn classify_all(&self, snippets: &[CandidateSnippet]) -> Vec<Classification> {
        let mut out = Vec::with_capacity(snippets.len());
        for snippet in snippets {
            out.push(self.classify(snippet).await);
        }
        out
    }
}
