//! Language model seam and an OpenAI-compatible HTTP client.
//!
//! The pipeline only needs single-turn completions (system + user message)
//! and query embeddings. [`OpenAiClient`] speaks the `/chat/completions` and
//! `/embeddings` endpoints of any OpenAI-compatible server.

use async_trait::async_trait;
use nomu_store::{QueryEmbedder, StoreError};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::json::extract_json;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Completion-token floors for reasoning models.
const REASONING_MIN_TOKENS: u32 = 3000;
const REASONING_MIN_TOKENS_LOW_EFFORT: u32 = 2000;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no JSON found in model reply: {0}")]
    NoJson(String),
    #[error("model returned an empty reply")]
    Empty,
    #[error("invalid API key header: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
    #[error("model call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A single-turn request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: Option<u32>,
    /// Short judgement calls; reasoning models run with low effort.
    pub low_effort: bool,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: None,
            low_effort: false,
        }
    }

    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn low_effort(mut self) -> Self {
        self.low_effort = true;
        self
    }
}

/// Text generation.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Reply text for `prompt`, trimmed. May be empty.
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;

    /// Reply parsed as JSON, tolerating fences, prose, and truncation.
    async fn complete_json(&self, prompt: &Prompt) -> Result<Value, LlmError> {
        let raw = self.complete(prompt).await?;
        if raw.trim().is_empty() {
            return Err(LlmError::Empty);
        }
        extract_json(&raw).ok_or_else(|| LlmError::NoJson(raw.chars().take(200).collect()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'static str>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible API.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
}

impl OpenAiClient {
    /// `base_url` should be like `https://api.openai.com/v1` (no trailing slash needed).
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
        }
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn chat_request<'a>(&'a self, prompt: &'a Prompt) -> ChatRequest<'a> {
        let reasoning = is_reasoning_model(&self.chat_model);
        let mut request = ChatRequest {
            model: &self.chat_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: None,
            max_tokens: None,
            max_completion_tokens: None,
            reasoning_effort: None,
        };
        if reasoning {
            let floor = if prompt.low_effort {
                request.reasoning_effort = Some("low");
                REASONING_MIN_TOKENS_LOW_EFFORT
            } else {
                REASONING_MIN_TOKENS
            };
            request.max_completion_tokens = prompt.max_tokens.map(|n| n.max(floor));
        } else {
            request.temperature = Some(0.2);
            request.max_tokens = prompt.max_tokens;
        }
        request
    }

    /// Embed one text with the configured embedding model.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or(LlmError::Empty)
    }

    /// Embed several texts in one request; output order follows `texts`.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let resp = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let mut parsed: EmbeddingResponse = resp.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(LlmError::Server {
                status: status.as_u16(),
                body: format!("expected {} embeddings, got {}", texts.len(), parsed.data.len()),
            });
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self.chat_request(prompt);

        debug!(model = %self.chat_model, max_tokens = ?prompt.max_tokens, "chat request");
        let resp = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        let Some(choice) = parsed.choices.into_iter().next() else {
            return Ok(String::new());
        };
        let content = choice.message.content.unwrap_or_default();
        debug!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or(""),
            chars = content.chars().count(),
            "chat reply"
        );
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl QueryEmbedder for OpenAiClient {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        self.embed(text)
            .await
            .map_err(|e| StoreError::Embedding(e.to_string()))
    }
}

/// Models that take `max_completion_tokens` and reject custom temperatures.
fn is_reasoning_model(model: &str) -> bool {
    let model = model.to_lowercase();
    model.contains("gpt-5")
        || model.contains("nano")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}
