//! Content filter applied to the top-ranked match.
//!
//! Only the best match is checked. A restricted document ranked second is
//! passed through; this is a cheap blocklist, not a content classifier.

use std::collections::HashSet;

use crate::document::SimilarityMatch;

/// Decides whether a retrieved match may be used to answer.
pub trait ContentFilter: Send + Sync {
    fn is_restricted(&self, top_match: &SimilarityMatch) -> bool;
}

/// Blocks matches whose `source_id` is on a fixed list.
#[derive(Debug, Clone, Default)]
pub struct SourceBlocklist {
    sources: HashSet<String>,
}

impl SourceBlocklist {
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { sources: sources.into_iter().map(Into::into).collect() }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ContentFilter for SourceBlocklist {
    fn is_restricted(&self, top_match: &SimilarityMatch) -> bool {
        self.sources.contains(top_match.source_id())
    }
}
