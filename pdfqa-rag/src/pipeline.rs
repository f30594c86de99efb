//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] owns the vector index and coordinates the two flows
//! that touch it:
//!
//! - **ingest**: extract → chunk → embed → stage → persist → publish
//! - **answer**: retrieve → compose → generate
//!
//! Ingestions serialize on the index's single-writer guard, which is held
//! from chunking until the new snapshot is both on disk and visible.
//! Answers never take that guard; they read whichever snapshot is current.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfqa_rag::{Document, RagConfig, RagPipeline};
//!
//! let pipeline = Arc::new(
//!     RagPipeline::builder()
//!         .config(RagConfig::from_env()?)
//!         .embedding_provider(Arc::new(my_embedder))
//!         .generator(Arc::new(my_llm))
//!         .build()
//!         .await?,
//! );
//!
//! pipeline.ingest(&Document::new("manual.pdf", bytes)).await?;
//! let answer = pipeline.answer("How do I reset the device?").await?;
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::chunking::FixedSizeChunker;
use crate::composer::ContextComposer;
use crate::config::RagConfig;
use crate::document::{Chunk, Document, IndexEntry, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::extract_text;
use crate::generation::{AnswerGenerator, GenerationOptions};
use crate::index::{IndexSnapshot, IndexState, IndexWriter, VectorIndex};
use crate::retriever::Retriever;
use crate::store::SnapshotStore;
use crate::timeout::with_timeout;

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Name of the ingested document.
    pub document: String,
    /// Number of chunks indexed for the document.
    pub chunks: usize,
    /// Total number of entries in the index after the commit.
    pub total_entries: usize,
}

/// A generated answer together with the chunks it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The generated answer text.
    pub text: String,
    /// The chunks placed in the prompt, most relevant first. Retrieved
    /// chunks that did not fit the context budget are not included.
    pub sources: RetrievalResult,
}

/// A point-in-time summary of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    /// Lifecycle state.
    pub state: IndexState,
    /// Number of indexed chunks.
    pub entries: usize,
    /// Number of distinct source documents.
    pub documents: usize,
    /// Embedding dimensionality, once established.
    pub dimensions: Option<usize>,
}

impl From<&IndexSnapshot> for IndexStatus {
    fn from(snapshot: &IndexSnapshot) -> Self {
        Self {
            state: snapshot.state(),
            entries: snapshot.len(),
            documents: snapshot.document_count(),
            dimensions: snapshot.dimensions(),
        }
    }
}

/// The RAG pipeline orchestrator.
///
/// Construct one per process via [`RagPipeline::builder()`] and share it
/// behind an `Arc`; every method takes `&self`.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn AnswerGenerator>,
    chunker: FixedSizeChunker,
    index: Arc<VectorIndex>,
    store: Arc<SnapshotStore>,
    retriever: Retriever,
    composer: ContextComposer,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a handle to the vector index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// The current lifecycle state.
    pub async fn state(&self) -> IndexState {
        self.index.state().await
    }

    /// Number of indexed chunks.
    pub async fn len(&self) -> usize {
        self.index.len().await
    }

    /// Whether nothing has been indexed.
    pub async fn is_empty(&self) -> bool {
        self.index.is_empty().await
    }

    /// Summarize the current index.
    pub async fn status(&self) -> IndexStatus {
        IndexStatus::from(&*self.index.snapshot().await)
    }

    /// Ingest a single document: extract → chunk → embed → persist → publish.
    ///
    /// Either every chunk of the document becomes visible and durable, or
    /// nothing changes. Failures are not retried.
    ///
    /// # Errors
    ///
    /// - [`RagError::Extraction`] / [`RagError::EmptyDocument`] if the
    ///   document yields no usable text
    /// - [`RagError::Provider`] if embedding fails, times out, or returns
    ///   non-finite values
    /// - [`RagError::DimensionMismatch`] if the provider's vectors do not fit
    ///   the index
    /// - [`RagError::Persistence`] if the snapshot cannot be written
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport> {
        let name = document.name.as_str();
        let text = extract_text(document).inspect_err(|e| {
            error!(document = %name, error = %e, "text extraction failed");
        })?;

        let writer = self.index.writer().await;

        let chunks: Vec<Chunk> = self.chunker.split(name, &text).collect();
        if chunks.is_empty() {
            warn!(document = %name, "document has no text to index");
            return Err(RagError::EmptyDocument { document: name.to_string() });
        }

        let embeddings = self.embed_chunks(name, &chunks).await?;
        let chunk_count = chunks.len();
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        let next = writer.stage(entries).inspect_err(|e| {
            error!(document = %name, error = %e, "index rejected document entries");
        })?;
        let committed = self.commit_durably(writer, next).await.inspect_err(|e| {
            error!(document = %name, error = %e, "failed to commit document");
        })?;

        info!(document = %name, chunk_count, total_entries = committed.len(), "ingested document");
        Ok(IngestReport {
            document: name.to_string(),
            chunks: chunk_count,
            total_entries: committed.len(),
        })
    }

    /// Ingest documents one after another.
    ///
    /// Documents committed before a failure stay committed.
    ///
    /// # Errors
    ///
    /// Returns the error of the first document that fails.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Result<Vec<IngestReport>> {
        let mut reports = Vec::with_capacity(documents.len());
        for document in documents {
            reports.push(self.ingest(document).await?);
        }
        Ok(reports)
    }

    /// Retrieve the chunks most relevant to `question` without generating.
    ///
    /// # Errors
    ///
    /// See [`Retriever::retrieve`].
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        self.retriever.retrieve(question).await
    }

    /// Answer `question` from the indexed documents.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotReady`] if no document has been ingested
    /// - [`RagError::Provider`] if embedding or generation fails or times out
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        if self.index.state().await == IndexState::Empty {
            return Err(RagError::NotReady);
        }

        let mut sources = self.retriever.retrieve(question).await.map_err(|e| match e {
            RagError::EmptyIndex => RagError::NotReady,
            other => {
                error!(question = %preview(question), error = %other, "retrieval failed");
                other
            }
        })?;

        sources.truncate(self.composer.fit(&sources));
        let prompt = self.composer.compose(question, &sources);
        let options = GenerationOptions { temperature: self.config.temperature };
        let provider = self.generator.name();
        let text = with_timeout(
            provider,
            self.config.provider_timeout,
            self.generator.generate(&prompt, options),
        )
        .await
        .map_err(|e| {
            error!(question = %preview(question), error = %e, "answer generation failed");
            e.in_stage(format!("answering '{}'", preview(question)))
        })?;

        info!(source_count = sources.len(), answer_chars = text.len(), "answered question");
        Ok(Answer { text, sources })
    }

    /// Drop every entry and persist the empty index.
    ///
    /// This is the only operation that removes entries or returns the
    /// index to [`IndexState::Empty`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persistence`] if the empty snapshot cannot be
    /// written; the index is unchanged in that case.
    pub async fn rebuild(&self) -> Result<()> {
        let writer = self.index.writer().await;
        let removed = writer.base().len();
        self.commit_durably(writer, IndexSnapshot::empty()).await?;
        warn!(removed, "index rebuilt from scratch");
        Ok(())
    }

    async fn embed_chunks(&self, document: &str, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let provider = self.embedding_provider.name();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

        let embeddings = with_timeout(
            provider,
            self.config.provider_timeout,
            self.embedding_provider.embed_batch(&texts),
        )
        .await
        .map_err(|e| {
            error!(document, error = %e, "embedding failed during ingestion");
            e.in_stage(format!("embedding document '{document}'"))
        })?;

        if embeddings.len() != chunks.len() {
            error!(document, expected = chunks.len(), actual = embeddings.len(), "embedding count mismatch");
            return Err(RagError::provider(
                provider,
                format!(
                    "embedding document '{document}': returned {} embeddings for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            ));
        }

        let non_finite = embeddings.iter().position(|e| !e.iter().all(|x| x.is_finite()));
        if let Some(position) = non_finite {
            let chunk = chunks[position].id();
            error!(document, chunk = %chunk, "provider returned a non-finite embedding");
            return Err(RagError::provider(
                provider,
                format!("embedding document '{document}': non-finite value for chunk {chunk}"),
            ));
        }

        let expected = self.embedding_provider.dimensions();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            error!(document, expected, actual = bad.len(), "provider returned wrong dimensionality");
            return Err(RagError::DimensionMismatch { expected, actual: bad.len() });
        }

        Ok(embeddings)
    }

    /// Persist `next` and then publish it, in a task that outlives the caller.
    ///
    /// Once started, the commit runs to completion even if the calling
    /// future is dropped, so the snapshot on disk and the one in memory
    /// never diverge. If the save fails, nothing is published.
    async fn commit_durably(
        &self,
        writer: IndexWriter,
        next: IndexSnapshot,
    ) -> Result<Arc<IndexSnapshot>> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            store.save(&next).await?;
            Ok::<_, RagError>(writer.commit(next).await)
        })
        .await
        .map_err(|e| RagError::Persistence(format!("commit task failed: {e}")))?
    }
}

/// A short, single-line rendering of a question for logs and error messages.
fn preview(question: &str) -> String {
    const MAX_CHARS: usize = 80;
    let mut preview: String =
        question.chars().take(MAX_CHARS).map(|c| if c.is_control() { ' ' } else { c }).collect();
    if question.chars().count() > MAX_CHARS {
        preview.push('…');
    }
    preview
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider` and `generator` are required. The configuration
/// defaults to [`RagConfig::default`], and the snapshot store defaults to
/// the configuration's `data_dir`.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .generator(Arc::new(llm))
///     .store(SnapshotStore::new("/var/lib/pdfqa")) // optional
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    store: Option<SnapshotStore>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the snapshot store.
    pub fn store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate the configuration, load the index snapshot, and build the
    /// [`RagPipeline`].
    ///
    /// A missing snapshot yields an empty index.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`] if a required field is missing or the
    ///   configuration is invalid
    /// - [`RagError::DimensionMismatch`] if the stored index was built with a
    ///   different dimensionality than the provider produces
    /// - [`RagError::Persistence`] if an existing snapshot cannot be read
    pub async fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;
        if embedding_provider.dimensions() == 0 {
            return Err(RagError::Config(format!(
                "embedding provider '{}' reports zero dimensions",
                embedding_provider.name()
            )));
        }

        let chunker = FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?;
        let store = self
            .store
            .unwrap_or_else(|| SnapshotStore::new(&config.data_dir))
            .with_embedding_model(embedding_provider.name());

        let index = Arc::new(VectorIndex::load(&store).await?);
        if let Some(stored) = index.snapshot().await.dimensions() {
            let expected = embedding_provider.dimensions();
            if stored != expected {
                error!(stored, expected, "index snapshot dimensionality differs from provider");
                return Err(RagError::DimensionMismatch { expected: stored, actual: expected });
            }
        }

        let retriever = Retriever::new(
            Arc::clone(&embedding_provider),
            Arc::clone(&index),
            config.top_k,
            config.provider_timeout,
        );
        let composer = ContextComposer::new(config.max_context_chars);

        info!(
            state = ?index.state().await,
            entries = index.len().await,
            embedding_model = embedding_provider.name(),
            generation_model = generator.name(),
            "pipeline ready"
        );

        Ok(RagPipeline {
            config,
            embedding_provider,
            generator,
            chunker,
            index,
            store: Arc::new(store),
            retriever,
            composer,
        })
    }
}
