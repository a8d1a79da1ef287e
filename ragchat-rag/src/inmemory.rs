//! In-memory vector store ranking by cosine distance.
//!
//! [`InMemoryVectorStore`] keeps every collection in a `HashMap` behind a
//! `tokio::sync::RwLock`. Searches take the read lock only, so concurrent
//! queries never contend with each other.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Document, SimilarityMatch};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "InMemory";

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    documents: HashMap<String, Arc<Document>>,
}

/// An in-memory vector store using cosine distance for search.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("sports", 384).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine distance `1 - cos(a, b)`.
///
/// A zero-magnitude vector has no direction; its distance to anything is 1.0.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0)
}

fn missing(collection: &str) -> RagError {
    RagError::VectorStoreError {
        backend: BACKEND.to_string(),
        message: format!("collection '{collection}' does not exist"),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        if dimensions == 0 {
            return Err(RagError::ConfigError("collection dimensions must be non-zero".into()));
        }
        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Collection { dimensions, documents: HashMap::new() });
        if collection.dimensions != dimensions {
            return Err(RagError::DimensionMismatch {
                expected: collection.dimensions,
                actual: dimensions,
            });
        }
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        if let Some(bad) = documents.iter().find(|d| d.embedding.len() != store.dimensions) {
            return Err(RagError::DimensionMismatch {
                expected: store.dimensions,
                actual: bad.embedding.len(),
            });
        }
        for document in documents {
            store.documents.insert(document.id.clone(), Arc::new(document.clone()));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        for id in ids {
            store.documents.remove(*id);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        if embedding.len() != store.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: store.dimensions,
                actual: embedding.len(),
            });
        }

        let mut scored: Vec<SimilarityMatch> = store
            .documents
            .values()
            .map(|document| SimilarityMatch {
                score: cosine_distance(&document.embedding, embedding),
                document: Arc::clone(document),
            })
            .collect();

        // Ties break on id so repeated searches return the same order.
        scored.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(collection).map(|c| c.documents.len()).ok_or_else(|| missing(collection))
    }

    async fn dimensions(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(collection).map(|c| c.dimensions).ok_or_else(|| missing(collection))
    }
}
