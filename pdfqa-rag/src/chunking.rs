//! Fixed-size document chunking.
//!
//! [`FixedSizeChunker`] slides a window of `chunk_size` characters across the
//! text, advancing by `chunk_size - chunk_overlap` each step. Windows are
//! measured in Unicode scalar values so multi-byte text is never split inside
//! a character.

use crate::document::Chunk;
use crate::error::{RagError, Result};

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Consecutive chunks overlap by exactly `chunk_overlap` characters. Every
/// chunk except the last is exactly `chunk_size` characters long.
///
/// # Example
///
/// ```rust
/// use pdfqa_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(5, 0).unwrap();
/// let texts: Vec<String> =
///     chunker.split("doc", "AAAAABBBBBCCCCC").map(|c| c.text).collect();
/// assert_eq!(texts, ["AAAAA", "BBBBB", "CCCCC"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - number of characters per chunk
    /// * `chunk_overlap` - number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] unless `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of characters shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Lazily split `text` into chunks attributed to `document`.
    ///
    /// The returned iterator borrows `text`; calling `split` again with the
    /// same inputs yields the same chunks. Empty text yields no chunks.
    pub fn split<'a>(&self, document: &'a str, text: &'a str) -> Chunks<'a> {
        Chunks {
            document,
            text,
            chunk_size: self.chunk_size,
            step: self.chunk_size - self.chunk_overlap,
            start: 0,
            sequence: 0,
            done: text.is_empty(),
        }
    }
}

/// Iterator over the chunks of one document, produced by [`FixedSizeChunker::split`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    document: &'a str,
    text: &'a str,
    chunk_size: usize,
    step: usize,
    /// Byte offset of the next window.
    start: usize,
    sequence: usize,
    done: bool,
}

impl Chunks<'_> {
    /// Byte offset reached after advancing `chars` characters from `from`.
    fn advance(&self, from: usize, chars: usize) -> usize {
        self.text[from..].char_indices().nth(chars).map_or(self.text.len(), |(i, _)| from + i)
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let end = self.advance(self.start, self.chunk_size);
        let chunk = Chunk {
            document: self.document.to_string(),
            sequence: self.sequence,
            text: self.text[self.start..end].to_string(),
        };

        if end == self.text.len() {
            self.done = true;
        } else {
            self.start = self.advance(self.start, self.step);
            self.sequence += 1;
        }

        Some(chunk)
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}
