//! Retrieval tool adapter.
//!
//! Wraps the vector index's search behind the callable the agent can
//! invoke, and captures structured citation metadata on the side: the
//! model-facing tool result and the UI-facing citation payload have
//! different shapes, so the adapter produces both from one search.
//!
//! The [`CitationSink`] is constructed per turn and never shared across
//! requests -- two in-flight turns must not observe each other's
//! citations. Citations accumulate across multiple retrieval calls in
//! the same turn and numbering continues, so inline `[n]` markers the
//! model already emitted stay resolvable.

use std::sync::Arc;

use parking_lot::Mutex;

use mn_domain::chat::{Citation, ToolDefinition};
use mn_index::VectorIndex;

/// Tool name the model sees.
pub const RETRIEVAL_TOOL_NAME: &str = "knowledge_search";

/// Tool result when the index has nothing relevant. Distinguishable from
/// an error; the model falls back to its own knowledge.
pub const NOT_FOUND_TEXT: &str = "No relevant information found in the knowledge base.";

/// Separator between result blocks in the model-facing tool result.
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Citation excerpts are capped at this many characters.
const EXCERPT_MAX_CHARS: usize = 500;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CitationSink
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-turn buffer of citations captured by retrieval calls.
#[derive(Default)]
pub struct CitationSink {
    citations: Mutex<Vec<Citation>>,
}

impl CitationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear captured citations. Called exactly once, before the agent
    /// loop starts -- never mid-loop.
    pub fn reset(&self) {
        self.citations.lock().clear();
    }

    /// Number of citations captured so far (the next call continues
    /// numbering from here).
    pub fn len(&self) -> usize {
        self.citations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.lock().is_empty()
    }

    fn extend(&self, items: Vec<Citation>) {
        self.citations.lock().extend(items);
    }

    /// Read the captured citations. Called once, after the loop ends.
    pub fn snapshot(&self) -> Vec<Citation> {
        self.citations.lock().clone()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RetrievalTool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct RetrievalTool {
    index: Arc<VectorIndex>,
    sink: Arc<CitationSink>,
    top_k: usize,
}

impl RetrievalTool {
    pub fn new(index: Arc<VectorIndex>, sink: Arc<CitationSink>, top_k: usize) -> Self {
        Self { index, sink, top_k }
    }

    /// The definition advertised to the model.
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: RETRIEVAL_TOOL_NAME.into(),
            description: "Search the user's personal knowledge base for passages relevant \
                          to a question. Use it whenever the question may be covered by \
                          the user's documents. Results are numbered [1], [2], ... -- cite \
                          those numbers inline in your answer."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The question, or its key part, to search for"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Run one retrieval and return the model-facing result text.
    ///
    /// Never fails: index errors become a textual result describing the
    /// failure, so the outer loop stays uninterrupted by retrieval faults.
    pub async fn invoke(&self, query: &str) -> String {
        tracing::debug!(query_len = query.len(), "knowledge search");

        let hits = match self.index.search(query, self.top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "knowledge search failed");
                return format!("Knowledge base search failed: {e}");
            }
        };

        if hits.is_empty() {
            tracing::debug!("knowledge search found nothing");
            return NOT_FOUND_TEXT.into();
        }

        let base = self.sink.len() as u32;
        let mut captured = Vec::with_capacity(hits.len());
        let mut blocks = Vec::with_capacity(hits.len());

        for (i, hit) in hits.iter().enumerate() {
            let id = base + i as u32 + 1;
            captured.push(Citation {
                id,
                source: hit.source_file.clone(),
                content: truncate_excerpt(&hit.text, EXCERPT_MAX_CHARS),
            });
            blocks.push(format!(
                "[{id}] source: {}\ncontent: {}",
                hit.source_file, hit.text
            ));
        }

        tracing::debug!(hits = hits.len(), "knowledge search captured citations");
        self.sink.extend(captured);
        blocks.join(BLOCK_SEPARATOR)
    }
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
fn truncate_excerpt(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_owned()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate_excerpt("short", 500), "short");
    }

    #[test]
    fn truncate_long_text_appends_ellipsis() {
        let long = "x".repeat(600);
        let out = truncate_excerpt(&long, 500);
        assert_eq!(out.chars().count(), 503);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let long = "知".repeat(510);
        let out = truncate_excerpt(&long, 500);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 503);
    }

    #[test]
    fn sink_reset_clears_and_snapshot_reads() {
        let sink = CitationSink::new();
        sink.extend(vec![Citation {
            id: 1,
            source: "a.txt".into(),
            content: "c".into(),
        }]);
        assert_eq!(sink.len(), 1);
        sink.reset();
        assert!(sink.is_empty());
        assert!(sink.snapshot().is_empty());
    }
}
