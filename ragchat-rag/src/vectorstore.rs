//! Vector store trait for storing and searching document embeddings.

use async_trait::async_trait;

use crate::document::{Document, SimilarityMatch};
use crate::error::Result;

/// A storage backend for document embeddings with similarity search.
///
/// Implementations manage named collections of [`Document`]s. Every
/// collection has a fixed dimensionality chosen at creation.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("sports", 384).await?;
/// store.upsert("sports", &documents).await?;
/// let matches = store.search("sports", &query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists with the same
    /// dimensionality.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its documents.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or replace documents by id.
    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()>;

    /// Delete documents by id.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Return at most `top_k` documents ordered by ascending cosine distance.
    ///
    /// An empty collection yields an empty vector, not an error.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>>;

    /// Number of documents in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Dimensionality the collection was created with.
    async fn dimensions(&self, collection: &str) -> Result<usize>;
}
