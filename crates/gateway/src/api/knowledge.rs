//! Knowledge-base endpoints: document upload and management, semantic
//! search, and index statistics.
//!
//! Upload pipeline: validate extension → save the raw file → extract
//! plain text → chunk → embed + index → record the document. Validation
//! failures are rejected with 400 before anything touches disk.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use mn_index::{chunk_document, extract, parse_file};

use crate::state::AppState;

use super::{internal_error, not_found};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/v1/knowledge/upload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    // Pull the "file" part out of the multipart body.
    let mut filename: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                filename = field.file_name().map(str::to_owned);
                match field.bytes().await {
                    Ok(b) => bytes = Some(b.to_vec()),
                    Err(e) => {
                        return bad_request(format!("failed to read upload: {e}")).into_response()
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return bad_request(format!("malformed multipart body: {e}")).into_response(),
        }
    }

    let (Some(filename), Some(bytes)) = (filename, bytes) else {
        return bad_request("missing 'file' field").into_response();
    };

    if !extract::is_supported_extension(&filename) {
        tracing::warn!(filename = %filename, "rejected unsupported file type");
        return bad_request(format!(
            "unsupported file type; supported: {}",
            extract::supported_extensions_label()
        ))
        .into_response();
    }

    let file_size = bytes.len() as i64;
    tracing::info!(filename = %filename, file_size, "document upload received");

    // Save under a timestamped name so re-uploads never clobber each other.
    let cfg = &state.config.knowledge;
    if let Err(e) = std::fs::create_dir_all(&cfg.documents_dir) {
        return internal_error(e).into_response();
    }
    let stored_name = format!(
        "{}_{}",
        chrono::Utc::now().format("%Y%m%d_%H%M%S%3f"),
        filename
    );
    let path = cfg.documents_dir.join(&stored_name);
    if let Err(e) = std::fs::write(&path, &bytes) {
        return internal_error(e).into_response();
    }

    // Extract, chunk, and index. Citations cite the original filename.
    let extracted = match parse_file(&path) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(error = %e, filename = %filename, "document extraction failed");
            return internal_error(e).into_response();
        }
    };
    let chunks = chunk_document(
        &extracted.content,
        &filename,
        cfg.chunk_size,
        cfg.chunk_overlap,
    );
    let chunk_count = chunks.len() as i64;

    if let Err(e) = state.index.add(chunks).await {
        tracing::error!(error = %e, filename = %filename, "indexing failed");
        return internal_error(e).into_response();
    }

    let record = match state.db.insert_document(
        &filename,
        &extracted.file_type,
        &path.to_string_lossy(),
        file_size,
        chunk_count,
    ) {
        Ok(r) => r,
        Err(e) => return internal_error(e).into_response(),
    };

    tracing::info!(
        document_id = record.id,
        filename = %filename,
        chunk_count,
        "document ingested"
    );

    Json(serde_json::json!({
        "success": true,
        "message": "document uploaded",
        "document_id": record.id,
        "filename": filename,
        "chunk_count": chunk_count,
    }))
    .into_response()
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message.into() })),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Document management
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_documents(State(state): State<AppState>) -> Response {
    match state.db.list_documents() {
        Ok(documents) => Json(serde_json::json!({
            "total": documents.len(),
            "documents": documents,
        }))
        .into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

pub async fn get_document(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.db.get_document(id) {
        Ok(Some(document)) => Json(document).into_response(),
        Ok(None) => not_found("document not found").into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

/// Delete the stored file and the record. Vector entries for the document
/// stay in the index (index deletion is out of scope; the original FAISS
/// store could not delete either).
pub async fn delete_document(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let document = match state.db.get_document(id) {
        Ok(Some(d)) => d,
        Ok(None) => return not_found("document not found").into_response(),
        Err(e) => return internal_error(e).into_response(),
    };

    if let Err(e) = std::fs::remove_file(&document.file_path) {
        tracing::warn!(error = %e, path = %document.file_path, "stored file removal failed");
    }
    if let Err(e) = state.db.delete_document(id) {
        return internal_error(e).into_response();
    }

    Json(serde_json::json!({
        "success": true,
        "message": "document deleted"
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search & stats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "d_search_k")]
    pub k: usize,
}

fn d_search_k() -> usize {
    5
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    match state.index.search(&params.query, params.k).await {
        Ok(results) => Json(serde_json::json!({
            "query": params.query,
            "count": results.len(),
            "results": results,
        }))
        .into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

pub async fn stats(State(state): State<AppState>) -> Response {
    let documents = match state.db.list_documents() {
        Ok(d) => d,
        Err(e) => return internal_error(e).into_response(),
    };

    let total_chunks: i64 = documents.iter().map(|d| d.chunk_count).sum();
    let total_size: i64 = documents.iter().map(|d| d.file_size).sum();
    let mut file_types: HashMap<String, usize> = HashMap::new();
    for doc in &documents {
        *file_types.entry(doc.file_type.clone()).or_default() += 1;
    }

    Json(serde_json::json!({
        "total_documents": documents.len(),
        "total_chunks": total_chunks,
        "total_size_bytes": total_size,
        "vector_count": state.index.count(),
        "file_types": file_types,
    }))
    .into_response()
}
