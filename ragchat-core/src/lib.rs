//! # ragchat-core
//!
//! Shared vocabulary for the ragchat question-answering pipeline.
//!
//! ## Overview
//!
//! - [`Query`] and [`QueryStatus`] describe one user question and where it ended up.
//! - [`GenerationClient`] is the capability every language-model backend implements,
//!   in a blocking mode ([`GenerationClient::generate`]) and a streaming mode
//!   ([`GenerationClient::generate_stream`]).
//! - [`GenerationStream`] separates the text fragments a caller displays from the
//!   [`Completion`] that later carries model metadata and token counts.
//! - [`ChatError`] is the error taxonomy used across the workspace.

pub mod error;
pub mod generation;
pub mod query;
pub mod stream;

pub use error::{ChatError, Result};
pub use generation::{GenerationClient, GenerationResult};
pub use query::{FilterReason, Query, QueryStatus};
pub use stream::{
    Completion, CompletionSender, FragmentStream, GenerationStream, completion_channel,
};
