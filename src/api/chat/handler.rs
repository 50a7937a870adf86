// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat endpoint handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::request::ChatRequest;
use super::response::ChatResponse;
use crate::api::http_server::AppState;
use crate::api::ApiError;

/// POST /chat - Answer a question about the uploaded document
///
/// # Request
/// - `message`: the question (required, non-blank)
/// - `chat_history`: earlier `[question, answer]` pairs (optional)
///
/// # Response
/// - `response`: generated answer
/// - `sources`: retrieved chunk contents the answer was grounded on
///
/// Without an uploaded document the reply is a 200 asking for one.
///
/// # Errors
/// - 400 Bad Request: malformed body or missing message
/// - 500 Internal Server Error: retrieval or generation failed
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let question = request.question()?;

    info!(
        "Chat message received ({} chars, {} history turns)",
        question.chars().count(),
        request.chat_history.len()
    );

    // Clone the Arc so a concurrent upload cannot swap the index mid-answer
    let Some(index) = state.index_slot.current().await else {
        debug!("Chat requested before any document was uploaded");
        return Ok(Json(ChatResponse::no_document()));
    };

    let start = Instant::now();
    let answer = state
        .qa_chain
        .ask(
            question,
            &request.chat_history,
            &index,
            state.embedder.as_ref(),
            state.generator.as_ref(),
        )
        .await
        .map_err(|e| ApiError::GenerationError(format!("{:#}", e)))?;

    info!(
        "Response generated in {:?} with {} sources",
        start.elapsed(),
        answer.source_documents.len()
    );

    Ok(Json(ChatResponse::from(answer)))
}

/// OPTIONS /chat
pub async fn chat_options_handler() -> Json<Value> {
    Json(json!({}))
}
