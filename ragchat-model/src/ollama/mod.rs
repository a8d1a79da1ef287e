//! Ollama provider.
//!
//! Talks to `/api/generate` on a locally hosted (or remote) Ollama server in
//! either blocking or streaming mode.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use ragchat_core::GenerationClient;
//! use ragchat_model::ollama::{OllamaClient, OllamaConfig};
//!
//! let client = OllamaClient::new(
//!     OllamaConfig::new("llama3.2").with_base_url("http://localhost:11434"),
//! )?;
//!
//! let mut stream = client.generate_stream("Question: football game recap").await?;
//! let completion = stream.completion();
//! while let Some(fragment) = stream.next().await {
//!     print!("{}", fragment?);
//! }
//! let result = completion.wait().await;
//! ```

mod client;
mod config;
mod wire;

pub use client::OllamaClient;
pub use config::{OLLAMA_API_BASE, OllamaConfig};
