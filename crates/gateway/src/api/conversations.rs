//! Conversation management endpoints (list / get / create / rename /
//! delete / messages). Plain CRUD over the store; the chat pipeline in
//! [`super::chat`] is the only writer of message content.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::state::AppState;

use super::{internal_error, not_found};

pub async fn list_conversations(State(state): State<AppState>) -> Response {
    match state.db.list_conversations() {
        Ok(conversations) => {
            Json(serde_json::json!({ "conversations": conversations })).into_response()
        }
        Err(e) => internal_error(e).into_response(),
    }
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Response {
    let conversation = match state.db.get_conversation(id) {
        Ok(Some(c)) => c,
        Ok(None) => return not_found("conversation not found").into_response(),
        Err(e) => return internal_error(e).into_response(),
    };
    let messages = match state.db.messages(id) {
        Ok(m) => m,
        Err(e) => return internal_error(e).into_response(),
    };
    Json(serde_json::json!({
        "id": conversation.id,
        "title": conversation.title,
        "created_at": conversation.created_at,
        "updated_at": conversation.updated_at,
        "messages": messages,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Json(body): Json<CreateConversationRequest>,
) -> Response {
    let title = body.title.as_deref().unwrap_or("New conversation");
    match state.db.create_conversation(title) {
        Ok(conversation) => (StatusCode::CREATED, Json(conversation)).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTitleRequest {
    pub title: String,
}

pub async fn update_title(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTitleRequest>,
) -> Response {
    match state.db.get_conversation(id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("conversation not found").into_response(),
        Err(e) => return internal_error(e).into_response(),
    }
    match state.db.update_conversation_title(id, &body.title) {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": "title updated"
        }))
        .into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Response {
    match state.db.delete_conversation(id) {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": "conversation deleted"
        }))
        .into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Response {
    match state.db.messages(id) {
        Ok(messages) => Json(serde_json::json!({ "messages": messages })).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}
