//! The wire protocol for streamed answers, plus the inline tool-marker
//! encoding embedded in `token` frames.
//!
//! Frames are JSON objects tagged by `type` and sent one per SSE data line:
//! `init` first, then `token`* (tool markers ride inside token content),
//! then at most one `sources`, then exactly one of `done`/`error`.
//!
//! Tool invocations are modeled as typed events everywhere inside the
//! pipeline; the bracketed `[[TOOL:…]]` text form exists only here, at the
//! wire/storage boundary, because stored transcripts and downstream UI
//! parse that encoding out of message content.

use serde::{Deserialize, Serialize};

use crate::chat::Citation;

/// One discrete unit of the streamed wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Always first; carries the conversation the turn belongs to.
    #[serde(rename = "init")]
    Init { conversation_id: i64 },

    /// Incremental answer content. May itself encode a tool marker.
    #[serde(rename = "token")]
    Token { content: String },

    /// Citations captured by retrieval during the turn. At most once,
    /// only when retrieval returned results.
    #[serde(rename = "sources")]
    Sources { sources: Vec<Citation> },

    /// Terminal success frame.
    #[serde(rename = "done")]
    Done {
        full_content: String,
        has_sources: bool,
    },

    /// Terminal failure frame; mutually exclusive with `done`.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Render the inline marker for a starting tool invocation.
///
/// The surrounding newlines keep the marker on its own line inside the
/// answer text; the persisted transcript contains it verbatim.
pub fn tool_start_marker(seq: u32, name: &str, arguments: &serde_json::Value) -> String {
    format!("\n[[TOOL:{seq}:{name}:running:{arguments}]]\n")
}

/// Render the closing marker for a finished tool invocation.
/// No leading newline: it follows the start marker's trailing one.
pub fn tool_end_marker(seq: u32, name: &str) -> String {
    format!("[[TOOL_END:{seq}:{name}]]")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_start_marker_format() {
        let args = serde_json::json!({"query": "deadline"});
        let marker = tool_start_marker(1, "knowledge_search", &args);
        assert_eq!(
            marker,
            "\n[[TOOL:1:knowledge_search:running:{\"query\":\"deadline\"}]]\n"
        );
    }

    #[test]
    fn tool_end_marker_has_no_leading_newline() {
        let marker = tool_end_marker(2, "knowledge_search");
        assert_eq!(marker, "[[TOOL_END:2:knowledge_search]]");
    }

    #[test]
    fn init_frame_serializes_with_type_tag() {
        let frame = Frame::Init { conversation_id: 42 };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "init");
        assert_eq!(json["conversation_id"], 42);
    }

    #[test]
    fn sources_frame_carries_citation_shape() {
        let frame = Frame::Sources {
            sources: vec![Citation {
                id: 1,
                source: "syllabus.pdf".into(),
                content: "excerpt".into(),
            }],
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "sources");
        assert_eq!(json["sources"][0]["id"], 1);
        assert_eq!(json["sources"][0]["source"], "syllabus.pdf");
    }

    #[test]
    fn done_frame_round_trips() {
        let frame = Frame::Done {
            full_content: "answer".into(),
            has_sources: true,
        };
        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        match back {
            Frame::Done { full_content, has_sources } => {
                assert_eq!(full_content, "answer");
                assert!(has_sources);
            }
            other => panic!("expected done frame, got {other:?}"),
        }
    }
}
