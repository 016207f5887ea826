//! Citation excerpts and snippet trimming

use crate::config::RetrievalConfig;
use crate::types::{Citation, RetrievalResult};

/// Leading `max_chars` characters of a segment followed by an ellipsis,
/// the form source excerpts are displayed in.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// One citation per retrieved segment, in retrieval order
pub fn build_citations(retrieved: &RetrievalResult, config: &RetrievalConfig) -> Vec<Citation> {
    retrieved
        .iter()
        .map(|hit| Citation::from_hit(hit, config.excerpt_chars))
        .collect()
}

/// Truncate a snippet to at most `max_chars` characters, ending at a word
/// boundary where one exists
pub fn truncate_snippet(snippet: &str, max_chars: usize) -> String {
    if snippet.chars().count() <= max_chars {
        return snippet.to_string();
    }

    let end = snippet
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(snippet.len());
    let head = &snippet[..end];

    match head.rfind(' ') {
        Some(pos) if pos > 0 => format!("{}...", &head[..pos]),
        _ => format!("{}...", head),
    }
}
