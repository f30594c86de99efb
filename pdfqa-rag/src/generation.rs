//! Answer generator trait for producing text from a composed prompt.

use async_trait::async_trait;

use crate::error::Result;

/// Sampling options forwarded to the generation model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: 0.0 }
    }
}

/// A language model that turns a prompt into an answer.
///
/// Failures (network, auth, rate limits) surface as
/// [`RagError::Provider`](crate::RagError::Provider) carrying
/// [`name`](AnswerGenerator::name).
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Model identifier, used to attribute provider errors.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String>;
}
