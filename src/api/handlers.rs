// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::http_server::AppState;
use crate::version;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub document_loaded: bool,
    /// Chunks in the current index, 0 when nothing is loaded
    pub chunks: usize,
    pub embedding_model: String,
    pub language_model: String,
    pub version: String,
}

/// GET /
pub async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome to the Document Chatter API"))
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let index = state.index_slot.current().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        document_loaded: index.is_some(),
        chunks: index.as_ref().map(|i| i.len()).unwrap_or(0),
        embedding_model: state.embedder.model_name().to_string(),
        language_model: state.generator.model_name().to_string(),
        version: version::VERSION.to_string(),
    })
}
