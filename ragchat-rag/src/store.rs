//! The document-store client used by the query pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::document::SimilarityMatch;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Answers nearest-neighbour queries over a read-only corpus.
///
/// Results are ordered best match first and never longer than `k`. An empty
/// corpus yields an empty vector.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SimilarityMatch>>;
}

/// A [`DocumentStore`] that embeds the query text and searches one collection
/// of a [`VectorStore`].
pub struct EmbeddedDocumentStore {
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    collection: String,
}

impl EmbeddedDocumentStore {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self { embedder, vector_store, collection: collection.into() }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Fail fast when the embedder and the collection disagree on dimensionality.
    pub async fn verify(&self) -> Result<()> {
        let expected = self.vector_store.dimensions(&self.collection).await?;
        let actual = self.embedder.dimensions();
        if expected != actual {
            return Err(RagError::DimensionMismatch { expected, actual });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for EmbeddedDocumentStore {
    #[instrument(skip(self, query), fields(collection = %self.collection))]
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SimilarityMatch>> {
        let embedding = self.embedder.embed(query).await?;
        if embedding.len() != self.embedder.dimensions() {
            return Err(RagError::DimensionMismatch {
                expected: self.embedder.dimensions(),
                actual: embedding.len(),
            });
        }
        let matches = self.vector_store.search(&self.collection, &embedding, k).await?;
        debug!(
            match_count = matches.len(),
            top_score = matches.first().map(|m| m.score),
            "search completed"
        );
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Document;
    use crate::inmemory::InMemoryVectorStore;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn model(&self) -> &str {
            "fixed"
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }
    }

    async fn store_with(dimensions: usize, embedding: Vec<f32>) -> EmbeddedDocumentStore {
        let vectors = Arc::new(InMemoryVectorStore::new());
        vectors.create_collection("sports", dimensions).await.unwrap();
        vectors
            .upsert(
                "sports",
                &[Document {
                    id: "1".into(),
                    source_id: "match.txt".into(),
                    content: "Team A won 3-1".into(),
                    embedding: vec![1.0; dimensions],
                    metadata: HashMap::new(),
                }],
            )
            .await
            .unwrap();
        EmbeddedDocumentStore::new(Arc::new(FixedEmbedder(embedding)), vectors, "sports")
    }

    #[tokio::test]
    async fn search_embeds_and_ranks() {
        let store = store_with(2, vec![1.0, 1.0]).await;
        store.verify().await.unwrap();
        let matches = store.search("football", 4).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source_id(), "match.txt");
        assert!(matches[0].score.abs() < 1e-6);
    }

    #[tokio::test]
    async fn verify_detects_dimension_mismatch() {
        let store = store_with(3, vec![1.0, 1.0]).await;
        assert!(matches!(
            store.verify().await,
            Err(RagError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }
}
