//! # ragchat-model
//!
//! Language-model clients implementing [`ragchat_core::GenerationClient`].
//!
//! - [`OllamaClient`] - an Ollama-compatible `/api/generate` endpoint, blocking or streaming
//! - [`MockGenerator`] - replays scripted fragments, for tests and offline runs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragchat_core::GenerationClient;
//! use ragchat_model::ollama::{OllamaClient, OllamaConfig};
//!
//! let client = OllamaClient::new(OllamaConfig::new("llama3.2"))?;
//! let result = client.generate("Question: who won the match?").await?;
//! println!("{} ({} tokens)", result.response, result.generated_tokens);
//! ```

pub mod mock;
#[cfg(feature = "ollama")]
pub mod ollama;

pub use mock::MockGenerator;
#[cfg(feature = "ollama")]
pub use ollama::{OllamaClient, OllamaConfig};
