//! Console rendering of answers and retrieval diagnostics.

use std::fmt::Write as _;

use ragchat_rag::Retrieval;

/// Characters of the top document shown under an answer.
pub const SNIPPET_CHARS: usize = 500;

/// Characters of each source id shown in the document list.
pub const SOURCE_CHARS: usize = 50;

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The block printed after every answer: snippet, top score, ranked sources.
pub fn diagnostics(retrieval: &Retrieval) -> String {
    let mut out = String::new();
    let snippet = truncate_chars(&retrieval.context, SNIPPET_CHARS);
    let _ = writeln!(out, "\nTop retrieved document snippet: {snippet}");
    let _ = writeln!(out, "Cosine distance (top match): {:.4}", retrieval.score);

    if retrieval.is_empty() {
        let _ = writeln!(out, "No relevant document found.");
        return out;
    }
    let _ = writeln!(out, "\nRetrieved documents and scores:");
    for (i, m) in retrieval.matches.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {}... | score: {:.4}",
            i + 1,
            truncate_chars(m.source_id(), SOURCE_CHARS),
            m.score
        );
    }
    out
}
