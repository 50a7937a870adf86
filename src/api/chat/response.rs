// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};

use crate::rag::QaAnswer;

pub const NO_DOCUMENT_MESSAGE: &str = "Please upload a document first.";

/// Response body for POST /chat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
    /// Contents of the retrieved chunks, most similar first
    pub sources: Vec<String>,
}

impl ChatResponse {
    pub fn no_document() -> Self {
        Self {
            response: NO_DOCUMENT_MESSAGE.to_string(),
            sources: Vec::new(),
        }
    }
}

impl From<QaAnswer> for ChatResponse {
    fn from(answer: QaAnswer) -> Self {
        Self {
            response: answer.answer,
            sources: answer
                .source_documents
                .into_iter()
                .map(|doc| doc.content)
                .collect(),
        }
    }
}
