//! # ragchat-rag
//!
//! Retrieval and orchestration for the ragchat question-answering pipeline.
//!
//! ## Overview
//!
//! - [`EmbeddingProvider`] / [`VectorStore`]: embedding backends and vector
//!   storage, with [`InMemoryVectorStore`] ranking by cosine distance
//! - [`CorpusSnapshot`]: a pre-embedded corpus loaded at startup
//! - [`DocumentStore`] / [`EmbeddedDocumentStore`]: query text in, ranked
//!   [`SimilarityMatch`]es out
//! - [`ContentFilter`] / [`SourceBlocklist`]: refuse to answer from listed sources
//! - [`ContextPolicy`]: include the top document in the prompt only when its
//!   distance is at most the threshold
//! - [`QueryPipeline`]: ties the above to a `GenerationClient` and a
//!   `TelemetrySink`
//!
//! ## Scores
//!
//! Every score is a cosine distance `1 - cos(a, b)` in `[0, 2]`. Lower is
//! closer, and results are always ordered ascending.
//!
//! ## Features
//!
//! - `ollama` (default): [`ollama::OllamaEmbeddingProvider`]

pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod inmemory;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod pipeline;
pub mod policy;
pub mod store;
pub mod vectorstore;

pub use config::{NO_DOCUMENT_TEXT, REFUSAL_TEXT, RagConfig, RagConfigBuilder};
pub use corpus::CorpusSnapshot;
pub use document::{Document, SimilarityMatch};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use filter::{ContentFilter, SourceBlocklist};
pub use inmemory::{InMemoryVectorStore, cosine_distance};
#[cfg(feature = "ollama")]
pub use ollama::OllamaEmbeddingProvider;
pub use pipeline::{Answer, QueryPipeline, QueryPipelineBuilder, Retrieval, StreamingAnswer};
pub use policy::{ContextPolicy, Prompt, build_prompt};
pub use store::{DocumentStore, EmbeddedDocumentStore};
pub use vectorstore::VectorStore;
