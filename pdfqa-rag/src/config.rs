//! Configuration for the RAG pipeline.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Prefix shared by every environment variable read by [`RagConfig::from_env`].
pub const ENV_PREFIX: &str = "PDFQA_";

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Identifier of the embedding model.
    pub embedding_model: String,
    /// Identifier of the generation model.
    pub generation_model: String,
    /// Chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Sampling temperature passed to the generation model.
    pub temperature: f32,
    /// Upper bound on the context section of a prompt, in characters.
    pub max_context_chars: usize,
    /// Timeout applied to every embedding and generation call.
    pub provider_timeout: Duration,
    /// Directory holding the index snapshot.
    pub data_dir: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model: "text-embedding-3-small".to_string(),
            generation_model: "gpt-4o".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            temperature: 0.0,
            max_context_chars: 12_000,
            provider_timeout: Duration::from_secs(60),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build a configuration from `PDFQA_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a variable cannot be parsed or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Keys are the full variable names, e.g. `PDFQA_CHUNK_SIZE`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut builder = Self::builder();

        if let Some(model) = var("EMBEDDING_MODEL") {
            builder = builder.embedding_model(model);
        }
        if let Some(model) = var("GENERATION_MODEL") {
            builder = builder.generation_model(model);
        }
        if let Some(value) = var("CHUNK_SIZE") {
            builder = builder.chunk_size(parse_var("CHUNK_SIZE", &value)?);
        }
        if let Some(value) = var("CHUNK_OVERLAP") {
            builder = builder.chunk_overlap(parse_var("CHUNK_OVERLAP", &value)?);
        }
        if let Some(value) = var("TOP_K") {
            builder = builder.top_k(parse_var("TOP_K", &value)?);
        }
        if let Some(value) = var("TEMPERATURE") {
            builder = builder.temperature(parse_var("TEMPERATURE", &value)?);
        }
        if let Some(value) = var("MAX_CONTEXT_CHARS") {
            builder = builder.max_context_chars(parse_var("MAX_CONTEXT_CHARS", &value)?);
        }
        if let Some(value) = var("PROVIDER_TIMEOUT_SECS") {
            let secs: u64 = parse_var("PROVIDER_TIMEOUT_SECS", &value)?;
            builder = builder.provider_timeout(Duration::from_secs(secs));
        }
        if let Some(dir) = var("DATA_DIR") {
            builder = builder.data_dir(dir);
        }

        builder.build()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `temperature` is outside `0.0..=2.0`
    /// - `max_context_chars == 0`
    /// - `provider_timeout` is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::Config(format!(
                "temperature ({}) must be between 0.0 and 2.0",
                self.temperature
            )));
        }
        if self.max_context_chars == 0 {
            return Err(RagError::Config(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        if self.provider_timeout.is_zero() {
            return Err(RagError::Config("provider_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        RagError::Config(format!("invalid value '{value}' for {ENV_PREFIX}{name}: {e}"))
    })
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the generation model identifier.
    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.config.generation_model = model.into();
        self
    }

    /// Set the chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the generation temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the context budget of a composed prompt, in characters.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set the timeout applied to provider calls.
    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.config.provider_timeout = timeout;
        self
    }

    /// Set the snapshot directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
