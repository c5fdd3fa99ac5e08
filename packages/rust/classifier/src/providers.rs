//! HTTP oracle providers: a local Ollama server and any OpenAI-compatible
//! chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cmsextract_shared::{CmsExtractError, ModelType, Result, SnippetKind};

use crate::oracle::{ClassificationOracle, INSTRUCTION, build_prompt, parse_model_type};

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CmsExtractError::config(format!("failed to build oracle HTTP client: {e}")))
}

fn oracle_error(provider: &str, e: impl std::fmt::Display) -> CmsExtractError {
    CmsExtractError::Classification(format!("{provider}: {e}"))
}

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama `/api/generate`, non-streaming.
pub struct OllamaOracle {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaOracle {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ClassificationOracle for OllamaOracle {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn classify(&self, kind: SnippetKind, text: &str) -> Result<ModelType> {
        let body = GenerateRequest {
            model: &self.model,
            system: INSTRUCTION,
            prompt: build_prompt(kind, text),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| oracle_error(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(oracle_error(self.name(), format!("HTTP {status}")));
        }

        let reply: GenerateResponse = response.json().await.map_err(|e| oracle_error(self.name(), e))?;
        debug!(model = %self.model, reply = %reply.response.trim(), "ollama replied");
        parse_model_type(&reply.response)
    }
}

// ---------------------------------------------------------------------------
// Chat completions
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

/// OpenAI-compatible `/chat/completions` (OpenRouter and friends).
pub struct ChatOracle {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatOracle {
    pub fn new(endpoint: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ClassificationOracle for ChatOracle {
    fn name(&self) -> &str {
        "chat"
    }

    async fn classify(&self, kind: SnippetKind, text: &str) -> Result<ModelType> {
        let prompt = build_prompt(kind, text);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: INSTRUCTION },
                ChatMessage { role: "user", content: &prompt },
            ],
            temperature: 0.0,
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| oracle_error(self.name(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(oracle_error(self.name(), format!("HTTP {status}")));
        }

        let reply: ChatResponse = response.json().await.map_err(|e| oracle_error(self.name(), e))?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| oracle_error(self.name(), "empty choices"))?;

        debug!(model = %self.model, reply = %content.trim(), "chat oracle replied");
        parse_model_type(&content)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn ollama_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({ "model": "gemma:2b", "stream": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gemma:2b",
                "response": "headline",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let oracle = OllamaOracle::new(&server.uri(), "gemma:2b", Duration::from_secs(5)).unwrap();
        let t = oracle.classify(SnippetKind::Heading, "Hi").await.unwrap();
        assert_eq!(t, ModelType::Headline);
    }

    #[tokio::test]
    async fn ollama_http_error_is_classification_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let oracle = OllamaOracle::new(&server.uri(), "gemma:2b", Duration::from_secs(5)).unwrap();
        let err = oracle.classify(SnippetKind::Card, "x").await.unwrap_err();
        assert!(matches!(err, CmsExtractError::Classification(_)));
    }

    #[tokio::test]
    async fn chat_sends_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "Teaser" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let oracle = ChatOracle::new(
            &format!("{}/", server.uri()),
            "some/model",
            Some("secret".into()),
            Duration::from_secs(5),
        )
        .unwrap();
        let t = oracle.classify(SnippetKind::Card, "Read more").await.unwrap();
        assert_eq!(t, ModelType::Teaser);
    }
}
