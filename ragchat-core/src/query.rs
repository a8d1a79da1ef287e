//! User queries and the terminal states a query can reach.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single user utterance. Never mutated once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Query {
    /// Identifier of this query; doubles as the telemetry run id.
    pub id: Uuid,
    /// The question as typed by the user.
    pub text: String,
}

impl Query {
    /// Create a query with a fresh random id.
    pub fn new(text: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), text: text.into() }
    }

    /// Create a query with a caller-chosen id.
    pub fn with_id(id: Uuid, text: impl Into<String>) -> Self {
        Self { id, text: text.into() }
    }
}

/// Why a query was answered without calling the language model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    /// The top-ranked document is on the restricted list.
    Restricted,
    /// The document store holds no documents.
    NoDocument,
}

/// Terminal state of one query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum QueryStatus {
    /// The model produced an answer.
    Answered,
    /// A fixed response was returned and generation was skipped.
    Filtered(FilterReason),
    /// Generation failed.
    Failed,
}

impl QueryStatus {
    /// Stable label used in logs and telemetry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::Filtered(FilterReason::Restricted) => "filtered_restricted",
            Self::Filtered(FilterReason::NoDocument) => "filtered_no_document",
            Self::Failed => "failed",
        }
    }

    /// Whether generation was skipped.
    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::Filtered(_))
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_get_distinct_ids() {
        let a = Query::new("football game recap");
        let b = Query::new("football game recap");
        assert_ne!(a.id, b.id);
        assert_eq!(a.text, b.text);
    }

    #[test]
    fn status_labels() {
        assert_eq!(QueryStatus::Answered.to_string(), "answered");
        assert_eq!(
            QueryStatus::Filtered(FilterReason::Restricted).as_str(),
            "filtered_restricted"
        );
        assert!(QueryStatus::Filtered(FilterReason::NoDocument).is_filtered());
        assert!(!QueryStatus::Failed.is_filtered());
    }

    #[test]
    fn status_serializes_with_reason() {
        let json = serde_json::to_value(QueryStatus::Filtered(FilterReason::NoDocument)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "filtered", "reason": "no_document"}));
    }
}
