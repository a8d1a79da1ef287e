//! Data types for corpus documents and search results.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An immutable unit of corpus content with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier within a collection.
    pub id: String,
    /// Stable origin identifier, usually the path of the source file.
    pub source_id: String,
    /// The text content of the document.
    pub content: String,
    /// The vector embedding of `content`.
    pub embedding: Vec<f32>,
    /// Key-value metadata carried over from ingestion.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// A retrieved [`Document`] paired with its cosine distance to the query.
///
/// Lower scores are closer; sequences are ordered best match first.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    /// The retrieved document, shared with the store.
    pub document: Arc<Document>,
    /// Cosine distance in `[0, 2]`.
    pub score: f32,
}

impl SimilarityMatch {
    /// Source id of the matched document, checked by the content filter.
    pub fn source_id(&self) -> &str {
        &self.document.source_id
    }

    /// Text of the matched document, used as prompt context.
    pub fn content(&self) -> &str {
        &self.document.content
    }
}
