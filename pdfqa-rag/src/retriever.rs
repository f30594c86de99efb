//! Top-k retrieval over the vector index.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::document::RetrievalResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::timeout::with_timeout;

/// Embeds a question and returns the `top_k` most similar chunks.
///
/// The index snapshot is captured before the question is embedded, so a
/// retrieval never mixes entries from two different publishes.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    top_k: usize,
    timeout: Duration,
}

impl Retriever {
    /// Create a retriever with a fixed `top_k` and provider timeout.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        top_k: usize,
        timeout: Duration,
    ) -> Self {
        Self { embedding_provider, index, top_k, timeout }
    }

    /// The number of chunks returned per question.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve the chunks most relevant to `question`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyIndex`] when nothing has been ingested, and
    /// [`RagError::Provider`] when embedding the question fails or times out.
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        let snapshot = self.index.snapshot().await;
        if snapshot.is_empty() {
            return Err(RagError::EmptyIndex);
        }

        let provider = self.embedding_provider.name();
        let query_embedding =
            with_timeout(provider, self.timeout, self.embedding_provider.embed(question))
                .await
                .map_err(|e| {
                    error!(error = %e, "embedding failed during retrieval");
                    e.in_stage("embedding question")
                })?;

        let results = snapshot.query(&query_embedding, self.top_k)?;
        debug!(result_count = results.len(), top_k = self.top_k, "retrieved chunks");
        Ok(results)
    }
}
