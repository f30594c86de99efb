//! In-memory vector index using exact cosine similarity.
//!
//! The index content lives in an immutable [`IndexSnapshot`]. Readers clone
//! the `Arc` of the current snapshot and search it without holding any lock.
//! Writers serialize on an [`IndexWriter`] guard, build the next snapshot off
//! to the side, and publish it with a single pointer swap. A query therefore
//! sees either all of an insert or none of it.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use crate::document::{IndexEntry, RetrievalResult, SearchResult};
use crate::error::{RagError, Result};
use crate::store::SnapshotStore;

/// Lifecycle state of the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// No document has been ingested; retrieval is disallowed.
    #[default]
    Empty,
    /// At least one document has been ingested.
    Ready,
}

/// An immutable view of the index at one point in time.
///
/// Entries are kept in insertion order as a list of shared segments, one per
/// insert, so deriving the next snapshot never copies existing entries.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    state: IndexState,
    dimensions: Option<usize>,
    segments: Vec<Arc<[IndexEntry]>>,
    len: usize,
}

impl IndexSnapshot {
    /// A snapshot with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rebuild a snapshot from persisted parts.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if an entry disagrees with
    /// `dimensions`, and [`RagError::Persistence`] if the state contradicts
    /// the entries.
    pub fn from_parts(
        state: IndexState,
        dimensions: Option<usize>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        match (state, entries.is_empty()) {
            (IndexState::Empty, false) => {
                return Err(RagError::Persistence(
                    "snapshot is marked empty but contains entries".to_string(),
                ));
            }
            (IndexState::Ready, true) => {
                return Err(RagError::Persistence(
                    "snapshot is marked ready but contains no entries".to_string(),
                ));
            }
            _ => {}
        }
        let mut snapshot = Self { state, dimensions, ..Self::default() };
        if !entries.is_empty() {
            snapshot = snapshot.with_entries(entries)?;
        }
        Ok(snapshot)
    }

    /// The lifecycle state.
    pub fn state(&self) -> IndexState {
        self.state
    }

    /// The embedding dimensionality established by the first insert.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the snapshot has no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.segments.iter().flat_map(|segment| segment.iter())
    }

    /// Number of distinct source documents.
    pub fn document_count(&self) -> usize {
        self.entries().map(|e| e.chunk.document.as_str()).collect::<HashSet<_>>().len()
    }

    /// Derive the snapshot that results from appending `entries`.
    ///
    /// `self` is left untouched. The dimensionality of every new entry must
    /// match the established one, or the first new entry's if none is
    /// established yet.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] or
    /// [`RagError::NonFiniteEmbedding`] on the first offending entry; no
    /// entry is applied in that case.
    pub fn with_entries(&self, entries: Vec<IndexEntry>) -> Result<Self> {
        let Some(first) = entries.first() else {
            return Ok(self.clone());
        };
        let expected = self.dimensions.unwrap_or(first.embedding.len());
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != expected) {
            return Err(RagError::DimensionMismatch { expected, actual: bad.embedding.len() });
        }
        // Non-finite components cannot be written to the JSON snapshot.
        if let Some(bad) = entries.iter().find(|e| !e.embedding.iter().all(|x| x.is_finite())) {
            return Err(RagError::NonFiniteEmbedding { chunk: bad.chunk.id() });
        }

        let mut next = self.clone();
        next.len += entries.len();
        next.segments.push(Arc::from(entries));
        next.dimensions = Some(expected);
        next.state = IndexState::Ready;
        Ok(next)
    }

    /// Return up to `k` entries ranked by cosine similarity to `vector`.
    ///
    /// Ranking is by descending score; equal scores keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyIndex`] if there are no entries and
    /// [`RagError::DimensionMismatch`] if `vector` has the wrong length.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult> {
        if self.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        if let Some(expected) = self.dimensions {
            if vector.len() != expected {
                return Err(RagError::DimensionMismatch { expected, actual: vector.len() });
            }
        }

        let mut scored: Vec<(usize, f32, &IndexEntry)> = self
            .entries()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(&entry.embedding, vector), entry))
            .collect();

        scored.sort_by(|a, b| rank(a.1, a.0, b.1, b.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(_, score, entry)| SearchResult { chunk: entry.chunk.clone(), score })
            .collect())
    }
}

/// Total order: higher score first, then earlier insertion position.
fn rank(score_a: f32, pos_a: usize, score_b: f32, pos_b: usize) -> Ordering {
    score_b.total_cmp(&score_a).then(pos_a.cmp(&pos_b))
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    if score.is_finite() { score } else { 0.0 }
}

/// A shared vector index supporting concurrent queries and serialized writes.
///
/// # Example
///
/// ```rust
/// # tokio_test_block_on(async {
/// use pdfqa_rag::{Chunk, IndexEntry, VectorIndex};
///
/// let index = VectorIndex::new();
/// let chunk = Chunk { document: "a.txt".into(), sequence: 0, text: "hello".into() };
/// index.insert(vec![IndexEntry { chunk, embedding: vec![1.0, 0.0] }]).await?;
///
/// let results = index.query(&[1.0, 0.0], 1).await?;
/// assert_eq!(results[0].chunk.text, "hello");
/// # Ok::<(), pdfqa_rag::RagError>(())
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Default)]
pub struct VectorIndex {
    current: RwLock<Arc<IndexSnapshot>>,
    writer: Arc<Mutex<()>>,
}

impl VectorIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index that starts from `snapshot`.
    pub fn from_snapshot(snapshot: IndexSnapshot) -> Self {
        Self { current: RwLock::new(Arc::new(snapshot)), writer: Arc::default() }
    }

    /// Load the index from `store`, or start empty if no snapshot exists.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persistence`] if a snapshot exists but cannot be read.
    pub async fn load(store: &SnapshotStore) -> Result<Self> {
        match store.load().await? {
            Some(snapshot) => Ok(Self::from_snapshot(snapshot)),
            None => Ok(Self::new()),
        }
    }

    /// The snapshot queries currently run against.
    pub async fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// The current lifecycle state.
    pub async fn state(&self) -> IndexState {
        self.snapshot().await.state()
    }

    /// Number of entries currently visible.
    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    /// Whether no entries are currently visible.
    pub async fn is_empty(&self) -> bool {
        self.snapshot().await.is_empty()
    }

    /// Return up to `k` entries ranked by similarity to `vector`.
    ///
    /// # Errors
    ///
    /// See [`IndexSnapshot::query`].
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult> {
        self.snapshot().await.query(vector, k)
    }

    /// Append `entries` atomically and return the new entry count.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any entry disagrees with
    /// the index dimensionality; the index is unchanged in that case.
    pub async fn insert(&self, entries: Vec<IndexEntry>) -> Result<usize> {
        let _guard = self.writer.lock().await;
        let next = self.snapshot().await.with_entries(entries)?;
        Ok(self.publish(next).await.len())
    }

    /// Write the current snapshot to `store`.
    ///
    /// Holds the writer lock so the written snapshot matches the last publish.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persistence`] if the write fails.
    pub async fn persist(&self, store: &SnapshotStore) -> Result<()> {
        let _guard = self.writer.lock().await;
        store.save(&*self.snapshot().await).await
    }

    /// Acquire the single-writer guard.
    ///
    /// The guard is owned so it can move into a spawned task; dropping it
    /// without calling [`IndexWriter::commit`] leaves the index unchanged.
    pub async fn writer(self: &Arc<Self>) -> IndexWriter {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let base = self.snapshot().await;
        IndexWriter { index: Arc::clone(self), base, _guard: guard }
    }

    async fn publish(&self, next: IndexSnapshot) -> Arc<IndexSnapshot> {
        let next = Arc::new(next);
        *self.current.write().await = Arc::clone(&next);
        debug!(entries = next.len(), "published index snapshot");
        next
    }
}

/// Exclusive write access to a [`VectorIndex`].
///
/// Obtained from [`VectorIndex::writer`]. While held, no other writer can
/// publish, so the snapshot staged from [`base`](IndexWriter::base) is
/// guaranteed to extend the one readers currently see.
#[derive(Debug)]
pub struct IndexWriter {
    index: Arc<VectorIndex>,
    base: Arc<IndexSnapshot>,
    _guard: OwnedMutexGuard<()>,
}

impl IndexWriter {
    /// The snapshot visible when the guard was acquired.
    pub fn base(&self) -> &IndexSnapshot {
        &self.base
    }

    /// Derive the snapshot that appending `entries` would produce.
    ///
    /// # Errors
    ///
    /// See [`IndexSnapshot::with_entries`].
    pub fn stage(&self, entries: Vec<IndexEntry>) -> Result<IndexSnapshot> {
        self.base.with_entries(entries)
    }

    /// Make `next` visible to readers and release the guard.
    pub async fn commit(self, next: IndexSnapshot) -> Arc<IndexSnapshot> {
        self.index.publish(next).await
    }
}
