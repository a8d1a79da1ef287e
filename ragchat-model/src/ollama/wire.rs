//! Wire format of `/api/generate` and the chunk handling shared by the
//! blocking and streaming paths.
//!
//! A blocking response is one JSON object with `done: true`. A streaming
//! response is newline-delimited JSON: every object carries an incremental
//! `response` fragment and the last one is flagged `done: true` with the
//! aggregate fields. Both are folded through the same [`ChunkAccumulator`].

use ragchat_core::GenerationResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateChunk {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

pub(crate) fn parse_chunk(line: &[u8]) -> Result<GenerateChunk, String> {
    serde_json::from_slice(line).map_err(|e| format!("malformed response chunk: {e}"))
}

/// Folds chunks into a [`GenerationResult`].
#[derive(Debug)]
pub(crate) struct ChunkAccumulator {
    model: String,
    response: String,
    created_at: String,
    total_duration_ns: u64,
    prompt_tokens: u64,
    generated_tokens: u64,
    done: bool,
}

impl ChunkAccumulator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            response: String::new(),
            created_at: String::new(),
            total_duration_ns: 0,
            prompt_tokens: 0,
            generated_tokens: 0,
            done: false,
        }
    }

    /// Apply one chunk, returning the fragment it carried (if any).
    ///
    /// An `error` field reported by the server is returned as `Err`.
    pub fn apply(&mut self, chunk: GenerateChunk) -> Result<Option<String>, String> {
        if let Some(error) = chunk.error {
            return Err(format!("model endpoint reported an error: {error}"));
        }
        if let Some(model) = chunk.model.filter(|m| !m.is_empty()) {
            self.model = model;
        }
        if let Some(created_at) = chunk.created_at {
            self.created_at = created_at;
        }

        let fragment = chunk.response.filter(|r| !r.is_empty());
        if let Some(fragment) = &fragment {
            self.response.push_str(fragment);
        }

        if chunk.done {
            self.done = true;
            self.total_duration_ns = chunk.total_duration.unwrap_or_default();
            self.prompt_tokens = chunk.prompt_eval_count.unwrap_or_default();
            self.generated_tokens = chunk.eval_count.unwrap_or_default();
        }

        Ok(fragment)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn text(&self) -> &str {
        &self.response
    }

    pub fn into_result(self) -> GenerationResult {
        GenerationResult {
            model: self.model,
            response: self.response,
            created_at: self.created_at,
            total_duration_ns: self.total_duration_ns,
            prompt_tokens: self.prompt_tokens,
            generated_tokens: self.generated_tokens,
            completed: self.done,
            error: None,
        }
    }
}

/// Splits a byte stream into newline-terminated lines.
///
/// Transport chunks do not align with JSON objects; a partial line is kept
/// until its newline arrives.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            push_non_blank(&mut lines, &line[..line.len() - 1]);
        }
        lines
    }

    /// Return whatever is left once the body has ended.
    pub fn finish(&mut self) -> Vec<Vec<u8>> {
        let rest = std::mem::take(&mut self.buffer);
        let mut lines = Vec::new();
        push_non_blank(&mut lines, &rest);
        lines
    }
}

fn push_non_blank(lines: &mut Vec<Vec<u8>>, line: &[u8]) {
    if line.iter().any(|b| !b.is_ascii_whitespace()) {
        lines.push(line.to_vec());
    }
}
