// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /chat and OPTIONS /chat through the full router

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use doc_chatter::api::create_app;
use serde_json::json;
use std::sync::Arc;
use tower::util::ServiceExt;

use crate::common::{
    chat_request, json_body, load_biology_index, test_state, FailingGenerator, FixedGenerator,
};

#[tokio::test]
async fn test_chat_before_upload_asks_for_document() {
    let state = test_state(Arc::new(FixedGenerator::new("unused")));
    let app = create_app(Arc::new(state));

    let response = app
        .oneshot(chat_request(json!({"message": "What is this about?"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["response"], "Please upload a document first.");
    assert_eq!(body["sources"], json!([]));
}

#[tokio::test]
async fn test_chat_returns_answer_and_sources() {
    let generator = Arc::new(FixedGenerator::new("  They produce ATP.  "));
    let state = test_state(generator.clone());
    load_biology_index(&state).await;
    let app = create_app(Arc::new(state));

    let response = app
        .oneshot(chat_request(json!({"message": "What do mitochondria produce?"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["response"], "They produce ATP.");

    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 3);
    assert!(sources[0].as_str().unwrap().contains("Mitochondria"));

    // One generation call without history, and the prompt carries the sources
    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    for source in sources {
        assert!(prompts[0].contains(source.as_str().unwrap()));
    }
}

#[tokio::test]
async fn test_chat_with_history_condenses_question() {
    let generator = Arc::new(FixedGenerator::new("What do mitochondria produce?"));
    let state = test_state(generator.clone());
    load_biology_index(&state).await;
    let app = create_app(Arc::new(state));

    let response = app
        .oneshot(chat_request(json!({
            "message": "What do they produce?",
            "chat_history": [["Tell me about mitochondria", "They are organelles."]]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Human: Tell me about mitochondria"));
    assert!(prompts[0].contains("Follow Up Input: What do they produce?"));
    assert!(prompts[1].contains("Question: What do mitochondria produce?"));
}

#[tokio::test]
async fn test_chat_generation_failure_returns_500_with_detail() {
    let state = test_state(Arc::new(FailingGenerator));
    load_biology_index(&state).await;
    let app = create_app(Arc::new(state));

    let response = app
        .oneshot(chat_request(json!({"message": "What is ATP?"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Error generating response: "));
    assert!(detail.contains("model exploded"));
    assert_eq!(body["error_type"], "generation_error");
}

#[tokio::test]
async fn test_chat_rejects_missing_or_blank_message() {
    let state = Arc::new(test_state(Arc::new(FixedGenerator::new("unused"))));

    for payload in [json!({}), json!({"message": "   "}), json!({"message": null})] {
        let response = create_app(state.clone())
            .oneshot(chat_request(payload.clone()))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "payload {} should be rejected",
            payload
        );
        let body = json_body(response).await;
        assert!(body["detail"].is_string());
    }
}

#[tokio::test]
async fn test_chat_rejects_malformed_json() {
    let state = test_state(Arc::new(FixedGenerator::new("unused")));
    let app = create_app(Arc::new(state));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error_type"], "invalid_request");
}

#[tokio::test]
async fn test_chat_options_returns_empty_object() {
    let state = test_state(Arc::new(FixedGenerator::new("unused")));
    let app = create_app(Arc::new(state));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/chat")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({}));
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let state = test_state(Arc::new(FixedGenerator::new("unused")));
    let app = create_app(Arc::new(state));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/chat")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
