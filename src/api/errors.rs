// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, warn};

/// JSON body of every error response
///
/// `detail` is what the web client displays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
    pub error_type: String,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    ValidationError { field: String, message: String },
    UnsupportedMediaType(String),
    /// Request body exceeded the configured upload limit
    PayloadTooLarge(String),
    /// Upload pipeline failure (extraction, splitting or embedding)
    ProcessingError(String),
    /// Retrieval or language model failure while answering
    GenerationError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, detail) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone()),
            ApiError::ValidationError { message, .. } => ("validation_error", message.clone()),
            ApiError::UnsupportedMediaType(msg) => ("unsupported_media_type", msg.clone()),
            ApiError::PayloadTooLarge(msg) => ("payload_too_large", msg.clone()),
            ApiError::ProcessingError(msg) => {
                ("processing_error", format!("Error processing document: {}", msg))
            }
            ApiError::GenerationError(msg) => {
                ("generation_error", format!("Error generating response: {}", msg))
            }
        };

        ErrorResponse {
            detail,
            error_type: error_type.to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_)
            | ApiError::ValidationError { .. }
            | ApiError::UnsupportedMediaType(_) => 400,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::ProcessingError(_) | ApiError::GenerationError(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::UnsupportedMediaType(msg) => write!(f, "Unsupported media type: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::ProcessingError(msg) => write!(f, "Error processing document: {}", msg),
            ApiError::GenerationError(msg) => write!(f, "Error generating response: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }

        (status, Json(self.to_response())).into_response()
    }
}
