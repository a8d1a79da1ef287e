//! Ollama embedding provider using the `/api/embed` endpoint.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default local Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// The default embedding model.
pub const DEFAULT_MODEL: &str = "all-minilm";

/// The dimensionality of `all-minilm`.
pub const DEFAULT_DIMENSIONS: usize = 384;

const PROVIDER: &str = "Ollama";

/// An [`EmbeddingProvider`] backed by an Ollama server.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new("http://localhost:11434")
///     .with_model("nomic-embed-text", 768);
/// let embedding = provider.embed("football game recap").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    embed_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for `all-minilm` (384 dimensions) at `base_url`.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            embed_url: format!("{}/api/embed", base_url.as_ref().trim_end_matches('/')),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Use another embedding model with its output dimensionality.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }
}

impl Default for OllamaEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

fn embedding_error(message: String) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message }
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("API returned empty response".into()))
    }

    #[instrument(skip_all, fields(model = %self.model, batch_size = texts.len()))]
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("embedding batch");

        let response = self
            .client
            .post(&self.embed_url)
            .json(&EmbedRequest { model: &self.model, input: texts })
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                embedding_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(embedding_error(format!("API returned {status}: {detail}")));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            embedding_error(format!("failed to parse response: {e}"))
        })?;

        if parsed.embeddings.len() != texts.len() {
            return Err(embedding_error(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed.embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
