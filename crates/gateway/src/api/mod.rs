pub mod chat;
pub mod conversations;
pub mod health;
pub mod knowledge;

use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        // Chat (core pipeline)
        .route("/api/v1/chat/send", post(chat::send_message))
        .route("/api/v1/chat/send/stream", post(chat::send_message_stream))
        // Conversations
        .route(
            "/api/v1/chat/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/api/v1/chat/conversations/:id",
            get(conversations::get_conversation).delete(conversations::delete_conversation),
        )
        .route(
            "/api/v1/chat/conversations/:id/title",
            put(conversations::update_title),
        )
        .route(
            "/api/v1/chat/conversations/:id/messages",
            get(conversations::list_messages),
        )
        // Knowledge base
        .route("/api/v1/knowledge/upload", post(knowledge::upload_document))
        .route("/api/v1/knowledge/documents", get(knowledge::list_documents))
        .route(
            "/api/v1/knowledge/documents/:id",
            get(knowledge::get_document).delete(knowledge::delete_document),
        )
        .route("/api/v1/knowledge/search", get(knowledge::search))
        .route("/api/v1/knowledge/stats", get(knowledge::stats))
}

// ── Shared handler helpers ──────────────────────────────────────────

pub(crate) fn internal_error(
    e: impl std::fmt::Display,
) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
}

pub(crate) fn not_found(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": message })),
    )
}
