//! OpenAI-backed embedding provider and answer generator.
//!
//! This module is only available when the `openai` feature is enabled. Both
//! types call the REST API directly with `reqwest` and work against any
//! OpenAI-compatible endpoint via `with_base_url`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{AnswerGenerator, GenerationOptions};

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default chat model for answer generation.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o";

fn require_key(api_key: String, model: &str) -> Result<String> {
    if api_key.is_empty() {
        return Err(RagError::provider(model, "API key must not be empty"));
    }
    Ok(api_key)
}

fn key_from_env(model: &str) -> Result<String> {
    std::env::var("OPENAI_API_KEY")
        .map_err(|_| RagError::provider(model, "OPENAI_API_KEY environment variable not set"))
}

/// Turn a non-success response into a provider error carrying the API's message.
async fn api_error(model: &str, response: reqwest::Response) -> RagError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    error!(provider = model, %status, "API error");
    RagError::provider(model, format!("API returned {status}: {detail}"))
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
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

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    ///
    /// Uses the default model (`text-embedding-3-small`) and dimensions (1536).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: require_key(api_key.into(), DEFAULT_EMBEDDING_MODEL)?,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(key_from_env(DEFAULT_EMBEDDING_MODEL)?)
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    ///
    /// `text-embedding-3-large` switches the default dimensionality to 3072.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        if self.request_dimensions.is_none() {
            self.dimensions = match self.model.as_str() {
                "text-embedding-3-large" => 3072,
                _ => DEFAULT_DIMENSIONS,
            };
        }
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    /// This also updates the value returned by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Point the provider at an OpenAI-compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = %self.model, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::provider(&self.model, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = %self.model, batch_size = texts.len(), "embedding batch");

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = %self.model, error = %e, "request failed");
                RagError::provider(&self.model, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(api_error(&self.model, response).await);
        }

        let mut embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = %self.model, error = %e, "failed to parse response");
            RagError::provider(&self.model, format!("failed to parse response: {e}"))
        })?;

        // The API documents `index` as the input position; do not rely on array order.
        embedding_response.data.sort_by_key(|d| d.index);
        Ok(embedding_response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Chat completions ───────────────────────────────────────────────

/// An [`AnswerGenerator`] backed by the OpenAI chat completions API.
///
/// The composed prompt is sent as a single user message.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::openai::OpenAIGenerator;
///
/// let generator = OpenAIGenerator::from_env()?.with_model("gpt-4o-mini");
/// ```
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIGenerator {
    /// Create a new generator with the given API key and the default `gpt-4o` model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: require_key(api_key.into(), DEFAULT_CHAT_MODEL)?,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        })
    }

    /// Create a new generator using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(key_from_env(DEFAULT_CHAT_MODEL)?)
    }

    /// Set the chat model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the generator at an OpenAI-compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl AnswerGenerator for OpenAIGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String> {
        debug!(provider = %self.model, prompt_len = prompt.len(), "generating answer");

        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = %self.model, error = %e, "request failed");
                RagError::provider(&self.model, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(api_error(&self.model, response).await);
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = %self.model, error = %e, "failed to parse response");
            RagError::provider(&self.model, format!("failed to parse response: {e}"))
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::provider(&self.model, "API returned no answer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(OpenAIEmbeddingProvider::new(""), Err(RagError::Provider { .. })));
        assert!(matches!(OpenAIGenerator::new(""), Err(RagError::Provider { .. })));
    }

    #[test]
    fn large_model_switches_default_dimensions() {
        let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap();
        assert_eq!(provider.dimensions(), 1536);
        let provider = provider.with_model("text-embedding-3-large");
        assert_eq!(provider.dimensions(), 3072);
        let provider = provider.with_dimensions(256).with_model("text-embedding-3-small");
        assert_eq!(provider.dimensions(), 256);
    }

    #[test]
    fn chat_request_shape() {
        let body = ChatRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let generator =
            OpenAIGenerator::new("sk-test").unwrap().with_base_url("http://localhost:11434/v1/");
        assert_eq!(generator.base_url, "http://localhost:11434/v1");
    }
}
