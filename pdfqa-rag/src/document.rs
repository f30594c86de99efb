//! Data types for documents, chunks, index entries, and search results.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// An uploaded document: raw bytes plus the filename it arrived under.
///
/// Documents are consumed during ingestion and not retained afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable identifier of the document, normally its filename.
    pub name: String,
    /// The raw file contents.
    pub bytes: Vec<u8>,
}

impl Document {
    /// Create a document from a name and its raw bytes.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }

    /// Create a document from already-extracted text.
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), bytes: text.into().into_bytes() }
    }

    /// The lowercase filename extension, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name).extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase)
    }
}

/// A contiguous text span extracted from one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Name of the source [`Document`].
    pub document: String,
    /// Position of this chunk within its document, starting at zero.
    pub sequence: usize,
    /// The chunk text.
    pub text: String,
}

impl Chunk {
    /// A stable identifier of the form `{document}#{sequence}`.
    pub fn id(&self) -> String {
        format!("{}#{}", self.document, self.sequence)
    }
}

/// A [`Chunk`] paired with its embedding, as stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The indexed chunk.
    pub chunk: Chunk,
    /// The chunk's embedding vector.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

/// Search results ordered by descending score, ties broken by insertion order.
pub type RetrievalResult = Vec<SearchResult>;
