//! Turn execution loop -- the orchestrator that streams one model+tools
//! interaction, classifies provider events, and re-emits a normalized
//! event stream for the transport layer.
//!
//! Entry point: [`run_turn`] spawns the async loop and returns a channel
//! of [`TurnEvent`]s. The caller reads events as they arrive for SSE
//! streaming, or drains them for the non-streaming variant.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use mn_domain::chat::{Citation, ContentPart, Message, MessageContent, Role, ToolCall};
use mn_domain::frame::{tool_end_marker, tool_start_marker};
use mn_domain::stream::StreamEvent;

use crate::runtime::retrieval::{CitationSink, RetrievalTool, RETRIEVAL_TOOL_NAME};
use crate::state::AppState;

/// System instructions: identity, retrieval policy, and the citation-marker
/// contract the retrieval tool's numbering relies on.
const SYSTEM_PROMPT: &str = "\
You are Mnema, a personal knowledge assistant. You answer the user's \
questions and, when a question may relate to their uploaded documents, you \
search their knowledge base with the knowledge_search tool.

Working rules:
1. Proactively call knowledge_search when the question could be covered by \
the user's documents.
2. Knowledge base results are numbered [1], [2], [3], ... When your answer \
uses a passage, put its marker right after the relevant statement, e.g. \
\"the report is due Friday [1] and must include source code [2]\".
3. If the knowledge base has nothing relevant, answer from your own \
knowledge instead.
4. Summarize retrieved passages in your own words; never paste them \
verbatim, and never show file names -- only the [n] markers.
5. Keep answers clear and well structured (Markdown is fine).";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnEvent -- the normalized event stream
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events emitted during a single turn, in order: `Token`s interleaved
/// with tool start/finish pairs, then an optional `Sources`, then exactly
/// one of `Done`/`Error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    /// Incremental answer text from the model.
    #[serde(rename = "token")]
    Token { text: String },

    /// The model began a tool invocation. `seq` is a turn-wide monotonic
    /// counter starting at 1, shared across tools.
    #[serde(rename = "tool_started")]
    ToolStarted {
        seq: u32,
        name: String,
        arguments: Value,
    },

    /// The tool invocation completed and its result went back to the model.
    #[serde(rename = "tool_finished")]
    ToolFinished { seq: u32, name: String },

    /// Citations captured by retrieval. Emitted at most once, before `Done`,
    /// only when retrieval returned results.
    #[serde(rename = "sources")]
    Sources { sources: Vec<Citation> },

    /// Terminal success. `full_content` is the complete answer including
    /// inline tool markers, exactly as persisted.
    #[serde(rename = "done")]
    Done {
        full_content: String,
        has_sources: bool,
    },

    /// Terminal failure; no `Done` follows and nothing is persisted.
    #[serde(rename = "error")]
    Error { message: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn input
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Input to a single turn. History is pre-built by the context builder;
/// the orchestrator never touches storage.
pub struct TurnInput {
    pub conversation_id: i64,
    pub user_message: String,
    /// Bounded history, chronological, excluding the current user message.
    pub history: Vec<Message>,
    /// Whether the retrieval tool is offered to the model.
    pub use_knowledge: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_turn -- the core orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one turn: build messages, call the model, dispatch retrieval, loop.
///
/// Returns a channel receiver of [`TurnEvent`]s. If the receiver is
/// dropped mid-turn (client disconnect) the loop stops at the next send.
pub fn run_turn(state: AppState, input: TurnInput) -> mpsc::Receiver<TurnEvent> {
    let (tx, rx) = mpsc::channel::<TurnEvent>(64);

    let span = tracing::info_span!(
        "turn",
        conversation_id = input.conversation_id,
        use_knowledge = input.use_knowledge,
    );
    tokio::spawn(tracing::Instrument::instrument(
        async move {
            if let Err(e) = run_turn_inner(state, input, tx.clone()).await {
                tracing::warn!(error = %e, "turn failed");
                let _ = tx
                    .send(TurnEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
            }
        },
        span,
    ));

    rx
}

async fn run_turn_inner(
    state: AppState,
    input: TurnInput,
    tx: mpsc::Sender<TurnEvent>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // 1. Resolve the executor provider and model.
    let provider = resolve_provider(&state)?;
    let model = state
        .llm
        .model_for_role("executor")
        .map(str::to_owned);

    // 2. Per-turn citation capture, wired into the retrieval tool.
    //    Scoped here so concurrent turns can never observe each other.
    let sink = Arc::new(CitationSink::new());
    sink.reset();
    let retrieval = RetrievalTool::new(
        state.index.clone(),
        sink.clone(),
        state.config.chat.retrieval_top_k,
    );

    let tool_defs = if input.use_knowledge {
        vec![RetrievalTool::definition()]
    } else {
        Vec::new()
    };

    // 3. Assemble the model input sequence.
    let mut messages = Vec::with_capacity(input.history.len() + 2);
    messages.push(Message::system(SYSTEM_PROMPT));
    messages.extend(input.history);
    messages.push(Message::user(&input.user_message));

    // 4. The model/tool loop. `answer` accumulates the full persisted
    //    content, tool markers included; `tool_seq` is shared across the
    //    whole turn.
    let mut answer = String::new();
    let mut tool_seq: u32 = 0;
    let max_loops = state.config.chat.max_tool_loops;

    for loop_idx in 0..max_loops {
        tracing::debug!(loop_idx, "model call");

        let req = mn_providers::ChatRequest {
            messages: messages.clone(),
            tools: tool_defs.clone(),
            temperature: Some(state.config.chat.temperature),
            max_tokens: None,
            model: model.clone(),
        };

        let mut stream = provider.chat_stream(&req).await?;

        // Text produced by this round only (markers excluded) -- it becomes
        // the assistant message replayed to the model on the next round.
        let mut round_text = String::new();
        let mut pending_tool_calls: Vec<ToolCall> = Vec::new();

        // Tool call assembly: call_id -> (name, args_json). Providers that
        // key argument deltas by index instead of call id are handled via
        // the positional order of started calls.
        let mut tc_bufs: HashMap<String, (String, String)> = HashMap::new();
        let mut tc_order: Vec<String> = Vec::new();

        while let Some(event_result) = stream.next().await {
            match event_result? {
                StreamEvent::Token { text } => {
                    answer.push_str(&text);
                    round_text.push_str(&text);
                    if tx.send(TurnEvent::Token { text }).await.is_err() {
                        // Client gone -- stop the turn.
                        return Ok(());
                    }
                }
                StreamEvent::ToolCallStarted { call_id, tool_name } => {
                    tc_order.push(call_id.clone());
                    tc_bufs.insert(call_id, (tool_name, String::new()));
                }
                StreamEvent::ToolCallDelta { call_id, delta } => {
                    let key = if tc_bufs.contains_key(&call_id) {
                        Some(call_id)
                    } else {
                        // Positional fallback: "0", "1", ... refer to the
                        // nth started call.
                        call_id
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| tc_order.get(i).cloned())
                    };
                    if let Some(key) = key {
                        if let Some((_, args)) = tc_bufs.get_mut(&key) {
                            args.push_str(&delta);
                        }
                    }
                }
                StreamEvent::ToolCallFinished {
                    call_id,
                    tool_name,
                    arguments,
                } => {
                    pending_tool_calls.push(ToolCall {
                        call_id: call_id.clone(),
                        tool_name,
                        arguments,
                    });
                    tc_order.retain(|id| id != &call_id);
                    tc_bufs.remove(&call_id);
                }
                StreamEvent::Done { .. } => {}
                StreamEvent::Error { message } => {
                    let _ = tx.send(TurnEvent::Error { message }).await;
                    return Ok(());
                }
            }
        }

        // Assemble calls that came through start/delta without an explicit
        // finish event, preserving start order.
        for call_id in tc_order.drain(..) {
            if let Some((name, args_str)) = tc_bufs.remove(&call_id) {
                let arguments = if args_str.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&args_str).unwrap_or_else(|e| {
                        tracing::warn!(
                            call_id = %call_id,
                            tool = %name,
                            error = %e,
                            "tool call arguments are not valid JSON; defaulting to empty object"
                        );
                        Value::Object(Default::default())
                    })
                };
                pending_tool_calls.push(ToolCall {
                    call_id,
                    tool_name: name,
                    arguments,
                });
            }
        }

        // No tool calls: this round's text is the final answer.
        if pending_tool_calls.is_empty() {
            let sources = sink.snapshot();
            let has_sources = !sources.is_empty();
            if has_sources {
                if tx.send(TurnEvent::Sources { sources }).await.is_err() {
                    return Ok(());
                }
            }
            let _ = tx
                .send(TurnEvent::Done {
                    full_content: answer,
                    has_sources,
                })
                .await;
            return Ok(());
        }

        // ── Tool dispatch ──────────────────────────────────────────
        messages.push(build_assistant_tool_message(&round_text, &pending_tool_calls));

        for tc in &pending_tool_calls {
            tool_seq += 1;

            // The marker is literal answer content: the persisted
            // transcript carries it verbatim for downstream parsing.
            answer.push_str(&tool_start_marker(tool_seq, &tc.tool_name, &tc.arguments));
            if tx
                .send(TurnEvent::ToolStarted {
                    seq: tool_seq,
                    name: tc.tool_name.clone(),
                    arguments: tc.arguments.clone(),
                })
                .await
                .is_err()
            {
                return Ok(());
            }

            let result = dispatch_tool(&retrieval, tc).await;

            answer.push_str(&tool_end_marker(tool_seq, &tc.tool_name));
            if tx
                .send(TurnEvent::ToolFinished {
                    seq: tool_seq,
                    name: tc.tool_name.clone(),
                })
                .await
                .is_err()
            {
                return Ok(());
            }

            messages.push(Message::tool_result(&tc.call_id, &result));
        }

        if loop_idx == max_loops - 1 {
            let _ = tx
                .send(TurnEvent::Error {
                    message: format!("tool loop limit reached ({max_loops} iterations)"),
                })
                .await;
        }
    }

    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn resolve_provider(
    state: &AppState,
) -> Result<Arc<dyn mn_providers::LlmProvider>, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(p) = state.llm.for_role("executor") {
        return Ok(p);
    }
    // Fallback: first available provider.
    if let Some((_, p)) = state.llm.iter().next() {
        return Ok(p.clone());
    }
    Err("no LLM providers available -- configure at least one under [llm.providers]".into())
}

/// Execute one tool call, absorbing failures into result text. Only the
/// retrieval tool is registered; anything else is answered with a stub so
/// the model can recover.
async fn dispatch_tool(retrieval: &RetrievalTool, tc: &ToolCall) -> String {
    if tc.tool_name == RETRIEVAL_TOOL_NAME {
        let query = tc
            .arguments
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        retrieval.invoke(query).await
    } else {
        tracing::warn!(tool = %tc.tool_name, "model invoked unknown tool");
        format!("Unknown tool: {}", tc.tool_name)
    }
}

fn build_assistant_tool_message(text: &str, tool_calls: &[ToolCall]) -> Message {
    let mut parts = Vec::new();

    if !text.is_empty() {
        parts.push(ContentPart::Text {
            text: text.to_owned(),
        });
    }

    for tc in tool_calls {
        parts.push(ContentPart::ToolUse {
            id: tc.call_id.clone(),
            name: tc.tool_name.clone(),
            input: tc.arguments.clone(),
        });
    }

    Message {
        role: Role::Assistant,
        content: MessageContent::Parts(parts),
    }
}
