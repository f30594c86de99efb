//! # pdfqa-rag
//!
//! Question answering over uploaded documents with retrieval-augmented
//! generation.
//!
//! ## Overview
//!
//! Documents are split into overlapping fixed-size chunks, embedded, and
//! stored in a shared in-memory vector index that is snapshotted to disk
//! after every ingestion. Questions are embedded, matched against the index
//! by cosine similarity, and the top chunks are composed into a prompt for a
//! language model.
//!
//! - [`FixedSizeChunker`] - overlapping character windows
//! - [`VectorIndex`] - copy-on-write index; concurrent readers, one writer
//! - [`SnapshotStore`] - atomic JSON snapshots
//! - [`Retriever`] / [`ContextComposer`] - top-k retrieval and prompt assembly
//! - [`RagPipeline`] - the orchestrator tying it together
//!
//! External models plug in through the [`EmbeddingProvider`] and
//! [`AnswerGenerator`] traits. OpenAI implementations are available with the
//! `openai` feature; PDF text extraction with the `pdf` feature.

pub mod chunking;
pub mod composer;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod retriever;
pub mod store;
mod timeout;

pub use chunking::{Chunks, FixedSizeChunker};
pub use composer::ContextComposer;
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, IndexEntry, RetrievalResult, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use extract::extract_text;
pub use generation::{AnswerGenerator, GenerationOptions};
pub use index::{IndexSnapshot, IndexState, IndexWriter, VectorIndex};
#[cfg(feature = "openai")]
pub use openai::{OpenAIEmbeddingProvider, OpenAIGenerator};
pub use pipeline::{Answer, IndexStatus, IngestReport, RagPipeline, RagPipelineBuilder};
pub use retriever::Retriever;
pub use store::SnapshotStore;
