//! Error types for the `pdfqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking, retrieval, or generation parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An embedding's dimensionality differs from the one the index was built with.
    #[error("Dimension mismatch: index expects {expected} dimensions, got {actual}")]
    DimensionMismatch {
        /// The dimensionality established by the index or provider.
        expected: usize,
        /// The dimensionality that was supplied.
        actual: usize,
    },

    /// An embedding contains NaN or infinite components.
    #[error("Embedding for chunk '{chunk}' contains non-finite values")]
    NonFiniteEmbedding {
        /// Identifier of the offending chunk.
        chunk: String,
    },

    /// A query was issued against an index with no entries.
    #[error("The index is empty; upload a document first")]
    EmptyIndex,

    /// An answer was requested before any document was ingested.
    #[error("No documents have been uploaded yet; upload a document first")]
    NotReady,

    /// A network, timeout, auth, or decode failure from an external model backend.
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// The model or backend that produced the error.
        provider: String,
        /// A description of the failure, including the stage it happened in.
        message: String,
    },

    /// The index snapshot could not be written or read.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The document's bytes could not be turned into text.
    #[error("Text extraction failed for '{document}': {message}")]
    Extraction {
        /// The document name.
        document: String,
        /// A description of the failure.
        message: String,
    },

    /// The document produced no chunks.
    #[error("Document '{document}' contains no text to index")]
    EmptyDocument {
        /// The document name.
        document: String,
    },
}

impl RagError {
    /// Build a [`RagError::Provider`] from anything displayable.
    pub(crate) fn provider(provider: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Provider { provider: provider.into(), message: message.to_string() }
    }

    /// Prefix a provider error message with the stage it happened in.
    ///
    /// Other variants pass through untouched so callers can still match on them.
    pub(crate) fn in_stage(self, stage: impl std::fmt::Display) -> Self {
        match self {
            Self::Provider { provider, message } => {
                Self::Provider { provider, message: format!("{stage}: {message}") }
            }
            other => other,
        }
    }

    /// Whether the error is the user-facing "upload a document first" condition.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady | Self::EmptyIndex)
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_stage_prefixes_provider_messages_only() {
        let err = RagError::provider("text-embedding-3-small", "connection reset")
            .in_stage("embedding document 'a.pdf'");
        assert_eq!(
            err.to_string(),
            "Provider error (text-embedding-3-small): embedding document 'a.pdf': connection reset"
        );

        let err = RagError::NotReady.in_stage("answering");
        assert!(matches!(err, RagError::NotReady));
    }

    #[test]
    fn not_ready_covers_both_empty_variants() {
        assert!(RagError::NotReady.is_not_ready());
        assert!(RagError::EmptyIndex.is_not_ready());
        assert!(!RagError::Persistence("disk full".into()).is_not_ready());
    }
}
