//! The `config.yaml` file.
//!
//! ```yaml
//! tracking:
//!   experiment_name: rag-chat
//!   backend: jsonl          # none | jsonl | mlflow
//!   directory: telemetry
//! retrieval:
//!   top_k: 4
//!   similarity_threshold: 0.35
//!   restricted_sources: ["00-Sports-Articles/vulgar.txt"]
//! corpus:
//!   path: corpus.json
//! llm:
//!   model_name: llama3.2
//!   embedding_model: all-minilm
//!   embedding_dimensions: 384
//! logging:
//!   format: pretty
//!   level: info
//! ```
//!
//! Every section and field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ragchat_model::OllamaConfig;
use ragchat_rag::RagConfig;
use ragchat_telemetry::{LogFormat, TrackingConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tracking: TrackingConfig,
    pub retrieval: RagConfig,
    pub corpus: CorpusSection,
    pub llm: LlmSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSection {
    /// Corpus snapshot JSON file.
    pub path: PathBuf,
    /// Collection the snapshot is loaded into.
    pub collection: String,
}

impl Default for CorpusSection {
    fn default() -> Self {
        Self { path: PathBuf::from("corpus.json"), collection: "corpus".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: String,
    pub model_name: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub request_timeout_secs: Option<u64>,
    /// Longest pause between two streamed chunks before the answer fails.
    pub stream_idle_timeout_secs: Option<u64>,
    pub connect_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        let ollama = OllamaConfig::default();
        Self {
            base_url: ollama.base_url,
            model_name: ollama.model,
            embedding_model: ragchat_rag::ollama::DEFAULT_MODEL.to_string(),
            embedding_dimensions: ragchat_rag::ollama::DEFAULT_DIMENSIONS,
            request_timeout_secs: ollama.request_timeout_secs,
            stream_idle_timeout_secs: ollama.stream_idle_timeout_secs,
            connect_timeout_secs: ollama.connect_timeout_secs,
        }
    }
}

impl LlmSection {
    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig::new(self.model_name.clone())
            .with_base_url(self.base_url.clone())
            .with_request_timeout(self.request_timeout_secs.map(Duration::from_secs))
            .with_stream_idle_timeout(self.stream_idle_timeout_secs.map(Duration::from_secs))
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { format: LogFormat::Pretty, level: "warn".to_string() }
    }
}

impl AppConfig {
    /// Read `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config = Self::from_yaml(&raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(raw).context("failed to parse YAML")?;
        config.retrieval.validate()?;
        Ok(config)
    }
}
