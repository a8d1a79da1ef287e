//! Corpus snapshots: a pre-embedded document set stored as JSON.
//!
//! A snapshot records which embedding model produced its vectors and their
//! dimensionality. Both are checked at startup, since query embeddings from a
//! different model would silently produce meaningless distances.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// A JSON corpus file.
///
/// ```json
/// {
///   "embedding_model": "all-minilm",
///   "dimensions": 384,
///   "documents": [
///     { "id": "1", "source_id": "articles/match.txt", "content": "...", "embedding": [ ... ] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusSnapshot {
    pub embedding_model: String,
    pub dimensions: usize,
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl CorpusSnapshot {
    pub fn new(embedding_model: impl Into<String>, dimensions: usize) -> Self {
        Self { embedding_model: embedding_model.into(), dimensions, documents: Vec::new() }
    }

    /// Read and validate a snapshot file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await.map_err(|e| {
            RagError::CorpusError(format!("failed to read '{}': {e}", path.display()))
        })?;
        let snapshot: Self = serde_json::from_slice(&raw).map_err(|e| {
            RagError::CorpusError(format!("failed to parse '{}': {e}", path.display()))
        })?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let raw = serde_json::to_vec_pretty(self)
            .map_err(|e| RagError::CorpusError(format!("failed to serialize corpus: {e}")))?;
        tokio::fs::write(path, raw).await.map_err(|e| {
            RagError::CorpusError(format!("failed to write '{}': {e}", path.display()))
        })
    }

    /// Check that every document matches the declared dimensionality and ids are unique.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(RagError::CorpusError("dimensions must be non-zero".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for document in &self.documents {
            if document.embedding.len() != self.dimensions {
                return Err(RagError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: document.embedding.len(),
                });
            }
            if !seen.insert(document.id.as_str()) {
                return Err(RagError::CorpusError(format!("duplicate document id '{}'", document.id)));
            }
        }
        Ok(())
    }

    /// Check that `embedder` produces vectors comparable to this snapshot's.
    pub fn check_embedder(&self, embedder: &dyn EmbeddingProvider) -> Result<()> {
        if embedder.model() != self.embedding_model {
            return Err(RagError::ConfigError(format!(
                "corpus was embedded with '{}' but the configured embedding model is '{}'",
                self.embedding_model,
                embedder.model()
            )));
        }
        if embedder.dimensions() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedder.dimensions(),
            });
        }
        Ok(())
    }

    /// Create `collection` and upsert every document into it.
    pub async fn load_into(&self, store: &dyn VectorStore, collection: &str) -> Result<usize> {
        store.create_collection(collection, self.dimensions).await?;
        store.upsert(collection, &self.documents).await?;
        info!(collection, document_count = self.documents.len(), "loaded corpus");
        Ok(self.documents.len())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::inmemory::InMemoryVectorStore;

    fn snapshot() -> CorpusSnapshot {
        let mut snapshot = CorpusSnapshot::new("all-minilm", 2);
        snapshot.documents.push(Document {
            id: "1".into(),
            source_id: "articles/match.txt".into(),
            content: "Team A won 3-1".into(),
            embedding: vec![1.0, 0.0],
            metadata: HashMap::new(),
        });
        snapshot
    }

    #[tokio::test]
    async fn save_load_and_populate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        snapshot().save(&path).await.unwrap();

        let loaded = CorpusSnapshot::load(&path).await.unwrap();
        assert_eq!(loaded, snapshot());

        let store = InMemoryVectorStore::new();
        assert_eq!(loaded.load_into(&store, "sports").await.unwrap(), 1);
        assert_eq!(store.count("sports").await.unwrap(), 1);
    }

    #[test]
    fn inconsistent_snapshots_are_rejected() {
        let mut bad = snapshot();
        bad.documents[0].embedding.push(0.5);
        assert!(matches!(bad.validate(), Err(RagError::DimensionMismatch { expected: 2, actual: 3 })));

        let mut dup = snapshot();
        dup.documents.push(dup.documents[0].clone());
        assert!(matches!(dup.validate(), Err(RagError::CorpusError(_))));
    }

    #[tokio::test]
    async fn missing_file_is_a_corpus_error() {
        let err = CorpusSnapshot::load("/definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, RagError::CorpusError(_)));
    }
}
