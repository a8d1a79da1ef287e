//! Error types for the `ragchat-rag` crate.

use ragchat_core::ChatError;
use thiserror::Error;

/// Errors that can occur while retrieving documents or assembling a pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An embedding does not have the dimensionality the collection expects.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the collection.
        expected: usize,
        /// Dimensionality of the offending embedding.
        actual: usize,
    },

    /// The corpus snapshot could not be read or is inconsistent.
    #[error("Corpus error: {0}")]
    CorpusError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<RagError> for ChatError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::ConfigError(_) | RagError::DimensionMismatch { .. } => {
                ChatError::Configuration(err.to_string())
            }
            RagError::EmbeddingError { provider, message } => {
                ChatError::Retrieval { backend: provider, message }
            }
            RagError::VectorStoreError { backend, message } => {
                ChatError::Retrieval { backend, message }
            }
            RagError::CorpusError(message) => {
                ChatError::Retrieval { backend: "corpus".into(), message }
            }
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_problems_are_configuration_errors() {
        let err: ChatError = RagError::DimensionMismatch { expected: 384, actual: 768 }.into();
        assert_eq!(
            err,
            ChatError::Configuration("Dimension mismatch: expected 384, got 768".into())
        );
    }

    #[test]
    fn store_failures_are_retrieval_errors() {
        let err: ChatError = RagError::VectorStoreError {
            backend: "InMemory".into(),
            message: "collection 'docs' does not exist".into(),
        }
        .into();
        assert!(matches!(err, ChatError::Retrieval { ref backend, .. } if backend == "InMemory"));
    }
}
