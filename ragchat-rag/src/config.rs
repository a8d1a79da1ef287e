//! Configuration for the query pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Text returned when the corpus holds no documents.
pub const NO_DOCUMENT_TEXT: &str = "No relevant document found.";

/// Text returned when the top match is restricted.
pub const REFUSAL_TEXT: &str = "no comment";

/// Configuration parameters for the query pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Number of documents requested per retrieval.
    pub top_k: usize,
    /// Largest cosine distance at which the top document is used as context.
    pub similarity_threshold: f32,
    /// Source ids that must never be used to answer.
    pub restricted_sources: Vec<String>,
    /// Response returned instead of generating when the top match is restricted.
    pub refusal_text: String,
    /// Context and response used when nothing was retrieved.
    pub no_document_text: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            similarity_threshold: 0.35,
            restricted_sources: Vec::new(),
            refusal_text: REFUSAL_TEXT.to_string(),
            no_document_text: NO_DOCUMENT_TEXT.to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check the invariants [`RagConfigBuilder::build`] enforces.
    ///
    /// Useful for configs deserialized directly from a file.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        let threshold = self.similarity_threshold;
        if !threshold.is_finite() || !(0.0..=2.0).contains(&threshold) {
            return Err(RagError::ConfigError(format!(
                "similarity_threshold ({threshold}) must be a cosine distance in [0, 2]"
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the number of documents requested per retrieval.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the cosine-distance threshold for context inclusion.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Add a source id to the restricted list.
    pub fn restrict_source(mut self, source_id: impl Into<String>) -> Self {
        self.config.restricted_sources.push(source_id.into());
        self
    }

    pub fn refusal_text(mut self, text: impl Into<String>) -> Self {
        self.config.refusal_text = text.into();
        self
    }

    pub fn no_document_text(mut self, text: impl Into<String>) -> Self {
        self.config.no_document_text = text.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - `similarity_threshold` is not a finite value in `[0, 2]`
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_validates() {
        let config = RagConfig::builder()
            .top_k(2)
            .similarity_threshold(0.5)
            .restrict_source("articles/leak.txt")
            .build()
            .unwrap();
        assert_eq!(config.top_k, 2);
        assert_eq!(config.restricted_sources, vec!["articles/leak.txt".to_string()]);

        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().similarity_threshold(-0.1).build().is_err());
        assert!(RagConfig::builder().similarity_threshold(f32::NAN).build().is_err());
        assert!(RagConfig::builder().similarity_threshold(2.0).build().is_ok());
    }
}
