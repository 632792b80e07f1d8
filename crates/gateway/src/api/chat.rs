//! Chat API -- the user-facing request handlers for the streaming pipeline.
//!
//! - `POST /api/v1/chat/send/stream` -- SSE: `init`, `token`*, optional
//!   `sources`, then `done`/`error`, each a JSON object in a `data:` line.
//! - `POST /api/v1/chat/send`        -- buffered: identical pipeline, one
//!   JSON response.
//!
//! The handler owns the turn's storage sequencing: the user message is
//! committed before any frame is emitted, and the assistant answer is
//! persisted only when the turn reaches `done` -- an aborted or failed
//! stream leaves a dangling user turn, which is expected and recoverable.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::Stream;
use serde::Deserialize;

use mn_domain::chat::Citation;
use mn_domain::error::Result;
use mn_domain::frame::{tool_end_marker, tool_start_marker, Frame};

use crate::runtime::{context, run_turn, TurnEvent, TurnInput};
use crate::state::AppState;

use super::internal_error;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatSendRequest {
    /// User message text.
    pub message: String,
    /// Existing conversation, or `None` to start a new one.
    #[serde(default)]
    pub conversation_id: Option<i64>,
    /// Whether the retrieval tool is offered to the model.
    #[serde(default = "d_true")]
    pub use_knowledge_base: bool,
}

fn d_true() -> bool {
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn preparation (shared by both variants)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct PreparedTurn {
    conversation_id: i64,
    input: TurnInput,
}

/// Resolve/create the conversation, persist the user message, and build
/// the bounded history. Storage failures here surface as request-level
/// errors -- streaming has not started yet.
fn prepare_turn(state: &AppState, req: &ChatSendRequest) -> Result<PreparedTurn> {
    let conversation = match req.conversation_id {
        Some(id) => state.db.get_conversation(id)?.ok_or_else(|| {
            mn_domain::Error::Storage(format!("conversation {id} not found"))
        })?,
        None => {
            let conv = state.db.create_conversation(&derive_title(&req.message))?;
            tracing::info!(conversation_id = conv.id, "new conversation created");
            conv
        }
    };

    let user_msg = state
        .db
        .append_message(conversation.id, "user", &req.message)?;

    let history = context::build_history(
        &state.db,
        conversation.id,
        state.config.chat.history_limit,
        user_msg.id,
    )?;

    Ok(PreparedTurn {
        conversation_id: conversation.id,
        input: TurnInput {
            conversation_id: conversation.id,
            user_message: req.message.clone(),
            history,
            use_knowledge: req.use_knowledge_base,
        },
    })
}

/// First 30 characters of the first message, with an ellipsis marker when
/// truncated.
fn derive_title(message: &str) -> String {
    let title: String = message.chars().take(30).collect();
    if message.chars().count() > 30 {
        format!("{title}...")
    } else {
        title
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/v1/chat/send/stream (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn send_message_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatSendRequest>,
) -> Response {
    let prepared = match prepare_turn(&state, &body) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "chat stream request failed before streaming");
            return internal_error(e).into_response();
        }
    };

    let rx = run_turn(state.clone(), prepared.input);
    let stream = encode_sse_stream(state, prepared.conversation_id, rx);

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Translate the normalized turn events into wire frames, flushing each
/// one as produced. Tool events are encoded as `token` frames carrying
/// the legacy marker text. The assistant answer is persisted when (and
/// only when) `done` arrives.
fn encode_sse_stream(
    state: AppState,
    conversation_id: i64,
    mut rx: tokio::sync::mpsc::Receiver<TurnEvent>,
) -> impl Stream<Item = std::result::Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        // `init` strictly precedes every other frame so the client can
        // react before the first token arrives.
        yield sse_frame(&Frame::Init { conversation_id });

        while let Some(event) = rx.recv().await {
            match event {
                TurnEvent::Token { text } => {
                    yield sse_frame(&Frame::Token { content: text });
                }
                TurnEvent::ToolStarted { seq, name, arguments } => {
                    yield sse_frame(&Frame::Token {
                        content: tool_start_marker(seq, &name, &arguments),
                    });
                }
                TurnEvent::ToolFinished { seq, name } => {
                    yield sse_frame(&Frame::Token {
                        content: tool_end_marker(seq, &name),
                    });
                }
                TurnEvent::Sources { sources } => {
                    yield sse_frame(&Frame::Sources { sources });
                }
                TurnEvent::Done { full_content, has_sources } => {
                    if let Err(e) =
                        state.db.append_message(conversation_id, "assistant", &full_content)
                    {
                        tracing::error!(error = %e, conversation_id, "failed to persist assistant message");
                    }
                    yield sse_frame(&Frame::Done { full_content, has_sources });
                }
                TurnEvent::Error { message } => {
                    // No assistant message is persisted for a failed turn.
                    yield sse_frame(&Frame::Error { message });
                }
            }
        }
    }
}

fn sse_frame(frame: &Frame) -> std::result::Result<Event, std::convert::Infallible> {
    Ok(Event::default().data(serde_json::to_string(frame).unwrap_or_default()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/v1/chat/send (buffered)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The drained result of one buffered turn.
pub struct ChatOutcome {
    pub conversation_id: i64,
    pub message: String,
    pub sources: Vec<Citation>,
    pub error: Option<String>,
}

/// Run the identical pipeline but buffer until the terminal event.
/// Public so the integration suite can drive the full coordinator path.
pub async fn execute_chat(state: &AppState, body: &ChatSendRequest) -> Result<ChatOutcome> {
    let prepared = prepare_turn(state, body)?;
    let conversation_id = prepared.conversation_id;
    let mut rx = run_turn(state.clone(), prepared.input);

    let mut message = String::new();
    let mut sources = Vec::new();
    let mut error = None;

    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::Done { full_content, .. } => {
                state
                    .db
                    .append_message(conversation_id, "assistant", &full_content)?;
                message = full_content;
            }
            TurnEvent::Sources { sources: s } => sources = s,
            TurnEvent::Error { message } => error = Some(message),
            TurnEvent::Token { .. }
            | TurnEvent::ToolStarted { .. }
            | TurnEvent::ToolFinished { .. } => {}
        }
    }

    Ok(ChatOutcome {
        conversation_id,
        message,
        sources,
        error,
    })
}

pub async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<ChatSendRequest>,
) -> Response {
    match execute_chat(&state, &body).await {
        Ok(outcome) => {
            if let Some(error) = outcome.error {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": error })),
                )
                    .into_response();
            }
            Json(serde_json::json!({
                "conversation_id": outcome.conversation_id,
                "message": outcome.message,
                "sources": outcome.sources,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "chat request failed");
            internal_error(e).into_response()
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_title_is_kept_verbatim() {
        assert_eq!(derive_title("What is the deadline?"), "What is the deadline?");
    }

    #[test]
    fn long_title_is_truncated_with_ellipsis() {
        let msg = "a".repeat(45);
        let title = derive_title(&msg);
        assert_eq!(title, format!("{}...", "a".repeat(30)));
    }

    #[test]
    fn exactly_thirty_chars_is_not_truncated() {
        let msg = "b".repeat(30);
        assert_eq!(derive_title(&msg), msg);
    }

    #[test]
    fn title_truncation_counts_chars_not_bytes() {
        let msg = "知".repeat(31);
        let title = derive_title(&msg);
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), 33);
    }
}
