// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload endpoint handler

use anyhow::Result;
use axum::{extract::State, Json};
use axum::http::StatusCode;
use axum_extra::extract::{multipart::MultipartError, Multipart};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::api::handlers::MessageResponse;
use crate::api::http_server::AppState;
use crate::api::ApiError;
use crate::documents::is_pdf_filename;
use crate::rag::DocumentIndex;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Document uploaded and processed successfully";

const FILE_FIELD: &str = "file";

/// Keeps the multipart layer's own status, so an oversized body reports 413
fn multipart_error(context: &str, error: MultipartError) -> ApiError {
    let message = format!("{}: {}", context, error.body_text());
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(message)
    } else {
        ApiError::InvalidRequest(message)
    }
}

/// Loads, splits and embeds a PDF, then swaps the new index in
///
/// The current index is only replaced once the new one is fully built,
/// so any failure leaves the previous document queryable.
///
/// Returns the number of chunks indexed.
pub async fn process_document(state: &AppState, file_name: &str, bytes: Vec<u8>) -> Result<usize> {
    let start = Instant::now();

    let pages = state.pdf_loader.load(file_name, bytes).await?;
    let chunks = state.splitter.split_documents(&pages);
    info!(
        "Split {} pages of {} into {} chunks",
        pages.len(),
        file_name,
        chunks.len()
    );

    let index = DocumentIndex::from_chunks(chunks, state.embedder.as_ref()).await?;
    let chunk_count = index.len();
    state.index_slot.replace(index).await;

    info!(
        "Document {} indexed: {} chunks in {:?}",
        file_name,
        chunk_count,
        start.elapsed()
    );
    Ok(chunk_count)
}

/// POST /upload - Index a PDF for chatting
///
/// # Request
/// multipart/form-data with the PDF in the `file` field
///
/// # Errors
/// - 400 Bad Request: no `file` field, or the file name does not end in `.pdf`
/// - 413 Payload Too Large: body exceeds the upload limit
/// - 500 Internal Server Error: extraction, splitting or embedding failed
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Invalid multipart body", e))?
    {
        if field.name() != Some(FILE_FIELD) {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read upload", e))?;
        upload = Some((file_name, bytes.to_vec()));
        break;
    }

    let (file_name, bytes) = upload.ok_or_else(|| ApiError::ValidationError {
        field: FILE_FIELD.to_string(),
        message: "No file uploaded".to_string(),
    })?;

    info!("Upload received: {} ({} bytes)", file_name, bytes.len());

    if !is_pdf_filename(&file_name) {
        return Err(ApiError::UnsupportedMediaType(
            "Only PDF files are supported".to_string(),
        ));
    }

    match process_document(&state, &file_name, bytes).await {
        Ok(_) => Ok(Json(MessageResponse::new(UPLOAD_SUCCESS_MESSAGE))),
        Err(e) => {
            warn!("Processing {} failed, keeping previous index", file_name);
            Err(ApiError::ProcessingError(e.to_string()))
        }
    }
}
