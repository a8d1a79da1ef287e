//! Context policy: whether retrieved text goes into the prompt.
//!
//! Scores are cosine distances, so the rule `score <= threshold` includes
//! context for close matches and sends the question alone otherwise. The
//! comparison is inclusive at the threshold.

use std::fmt;

/// Text sent to the language model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Text sent to the model.
    pub text: String,
    /// Whether `text` carries retrieved context.
    pub includes_context: bool,
}

impl Prompt {
    /// `Question: {query}`
    pub fn question_only(query: &str) -> Self {
        Self { text: format!("Question: {query}"), includes_context: false }
    }

    /// `Context: {context}` followed by a blank line and `Question: {query}`.
    pub fn with_context(query: &str, context: &str) -> Self {
        Self { text: format!("Context: {context}\n\nQuestion: {query}"), includes_context: true }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Build the prompt for `query` given the top match's score and content.
pub fn build_prompt(query: &str, score: f32, context: &str, threshold: f32) -> Prompt {
    if score <= threshold {
        Prompt::with_context(query, context)
    } else {
        Prompt::question_only(query)
    }
}

/// [`build_prompt`] bound to a fixed threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextPolicy {
    threshold: f32,
}

impl ContextPolicy {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn includes_context(&self, score: f32) -> bool {
        score <= self.threshold
    }

    pub fn build_prompt(&self, query: &str, score: f32, context: &str) -> Prompt {
        build_prompt(query, score, context, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_match_includes_context() {
        let prompt = build_prompt("football game recap", 0.20, "Team A won 3-1", 0.35);
        assert!(prompt.includes_context);
        assert!(prompt.text.contains("Team A won 3-1"));
        assert_eq!(prompt.text, "Context: Team A won 3-1\n\nQuestion: football game recap");
    }

    #[test]
    fn distant_match_sends_question_alone() {
        let prompt = build_prompt("football game recap", 0.50, "Team A won 3-1", 0.35);
        assert!(!prompt.includes_context);
        assert!(!prompt.text.contains("Team A won 3-1"));
        assert_eq!(prompt.text, "Question: football game recap");
    }

    #[test]
    fn threshold_is_inclusive() {
        let policy = ContextPolicy::new(0.35);
        assert!(policy.includes_context(0.35));
        assert!(policy.build_prompt("q", 0.35, "ctx").includes_context);
        assert!(!policy.includes_context(0.350_001));
    }
}
