// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::rag::ChatTurn;

/// Request body for POST /chat
///
/// ```json
/// {
///   "message": "What do mitochondria produce?",
///   "chat_history": [["What is ATP?", "An energy carrier."]]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,

    /// Earlier (question, answer) pairs, oldest first
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
}

impl ChatRequest {
    /// Returns the trimmed question
    pub fn question(&self) -> Result<&str, ApiError> {
        match self.message.as_deref().map(str::trim) {
            Some(question) if !question.is_empty() => Ok(question),
            Some(_) => Err(ApiError::ValidationError {
                field: "message".to_string(),
                message: "message must not be empty".to_string(),
            }),
            None => Err(ApiError::ValidationError {
                field: "message".to_string(),
                message: "message is required".to_string(),
            }),
        }
    }
}
