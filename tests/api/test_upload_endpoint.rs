// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /upload through the full router
//!
//! PDFs are generated on the fly with lopdf; embeddings use feature hashing
//! so no model files are needed.

use axum::http::StatusCode;
use doc_chatter::api::create_app;
use doc_chatter::documents::{PdfLoader, RecursiveCharacterTextSplitter};
use doc_chatter::rag::ConversationalQaChain;
use serde_json::json;
use std::sync::Arc;
use tower::util::ServiceExt;

use crate::common::{
    biology_pdf, chat_request, get_request, json_body, load_biology_index, test_state,
    upload_request, FixedGenerator,
};

#[tokio::test]
async fn test_upload_pdf_then_chat_returns_sources() {
    let state = Arc::new(test_state(Arc::new(FixedGenerator::new("ATP."))));

    let response = create_app(state.clone())
        .oneshot(upload_request("file", "biology.pdf", &biology_pdf()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"message": "Document uploaded and processed successfully"})
    );

    let index = state.index_slot.current().await.unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index.entries()[0].chunk.metadata.source, "biology.pdf");
    assert_eq!(index.entries()[1].chunk.metadata.page, 1);

    let response = create_app(state.clone())
        .oneshot(chat_request(json!({"message": "What do mitochondria produce?"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["response"], "ATP.");
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert!(sources[0]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("mitochondria"));
}

#[tokio::test]
async fn test_upload_uses_configured_splitter_and_retriever() {
    let state = test_state(Arc::new(FixedGenerator::new("Light.")))
        .with_splitter(RecursiveCharacterTextSplitter::new(40, 0).unwrap())
        .with_qa_chain(ConversationalQaChain::new(1));
    let state = Arc::new(state);

    let response = create_app(state.clone())
        .oneshot(upload_request("file", "biology.pdf", &biology_pdf()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let index = state.index_slot.current().await.unwrap();
    assert!(index.len() >= 3);
    assert!(index.entries().iter().all(|e| e.chunk.content.chars().count() <= 40));

    let response = create_app(state)
        .oneshot(chat_request(json!({"message": "What does photosynthesis convert?"})))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["sources"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_rejects_non_pdf_name() {
    let state = Arc::new(test_state(Arc::new(FixedGenerator::new("unused"))));

    for name in ["notes.txt", "report.PDF", "pdf"] {
        let response = create_app(state.clone())
            .oneshot(upload_request("file", name, b"hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", name);
        let body = json_body(response).await;
        assert_eq!(body["detail"], "Only PDF files are supported");
    }

    assert!(!state.index_slot.is_loaded().await);
}

#[tokio::test]
async fn test_upload_without_file_field_is_rejected() {
    let state = Arc::new(test_state(Arc::new(FixedGenerator::new("unused"))));

    let response = create_app(state.clone())
        .oneshot(upload_request("document", "biology.pdf", &biology_pdf()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error_type"], "validation_error");
    assert!(!state.index_slot.is_loaded().await);
}

#[tokio::test]
async fn test_failed_upload_keeps_previous_index() {
    let state = Arc::new(test_state(Arc::new(FixedGenerator::new("unused"))));
    load_biology_index(&state).await;
    let before = state.index_slot.current().await.unwrap();

    let response = create_app(state.clone())
        .oneshot(upload_request("file", "broken.pdf", b"this is not a pdf"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Error processing document: "));

    let after = state.index_slot.current().await.unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn test_empty_pdf_upload_fails() {
    let state = Arc::new(test_state(Arc::new(FixedGenerator::new("unused"))));

    let response = create_app(state.clone())
        .oneshot(upload_request("file", "empty.pdf", b""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(
        body["detail"],
        "Error processing document: Uploaded file is empty"
    );
}

#[tokio::test]
async fn test_second_upload_replaces_first() {
    let state = Arc::new(test_state(Arc::new(FixedGenerator::new("unused"))));
    load_biology_index(&state).await;
    let before = state.index_slot.current().await.unwrap();
    assert_eq!(before.len(), 4);

    let response = create_app(state.clone())
        .oneshot(upload_request("file", "biology.pdf", &biology_pdf()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let after = state.index_slot.current().await.unwrap();
    assert_eq!(after.len(), 2);
    // A query holding the old index still sees it intact
    assert_eq!(before.len(), 4);
}

#[tokio::test]
async fn test_upload_temp_files_are_removed() {
    let temp_dir = tempfile::tempdir().unwrap();
    let state = test_state(Arc::new(FixedGenerator::new("unused")))
        .with_pdf_loader(PdfLoader::new().with_temp_dir(temp_dir.path()));
    let state = Arc::new(state);

    let ok = create_app(state.clone())
        .oneshot(upload_request("file", "biology.pdf", &biology_pdf()))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    let bad = create_app(state.clone())
        .oneshot(upload_request("file", "broken.pdf", b"%PDF-1.4 garbage"))
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_over_body_limit_is_not_indexed() {
    let state = test_state(Arc::new(FixedGenerator::new("unused"))).with_max_upload_bytes(1024);
    let state = Arc::new(state);

    let oversized = vec![b'x'; 8 * 1024];
    let response = create_app(state.clone())
        .oneshot(upload_request("file", "large.pdf", &oversized))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(response).await;
    assert_eq!(body["error_type"], "payload_too_large");
    assert!(!state.index_slot.is_loaded().await);

    let health = create_app(state)
        .oneshot(get_request("/health"))
        .await
        .unwrap();
    assert_eq!(json_body(health).await["documentLoaded"], false);
}
