// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Shared fixtures for integration tests: stub generators, PDF builder, HTTP helpers
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
};
use doc_chatter::{
    api::AppState,
    documents::{ChunkMetadata, DocumentChunk},
    embeddings::HashingEmbedder,
    inference::{GenerationOutput, GenerationRequest, TextGenerator},
    rag::DocumentIndex,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_DIMENSION: usize = 1024;
pub const BOUNDARY: &str = "doc-chatter-test-boundary";

/// Always answers with the same text and records every prompt it sees
pub struct FixedGenerator {
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl FixedGenerator {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(GenerationOutput {
            text: self.answer.clone(),
            prompt_tokens: request.prompt.len() / 4,
            tokens_generated: 3,
            generation_time: Duration::from_millis(1),
            finish_reason: "eos".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "fixed-test-generator"
    }
}

pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationOutput> {
        Err(anyhow!("model exploded"))
    }

    fn model_name(&self) -> &str {
        "failing-test-generator"
    }
}

pub fn hashing_embedder() -> Arc<HashingEmbedder> {
    Arc::new(HashingEmbedder::new(TEST_DIMENSION).unwrap())
}

pub fn test_state(generator: Arc<dyn TextGenerator>) -> AppState {
    AppState::new(hashing_embedder(), generator)
}

pub fn chunk(content: &str, page: usize) -> DocumentChunk {
    DocumentChunk {
        content: content.to_string(),
        metadata: ChunkMetadata {
            source: "biology.pdf".to_string(),
            page,
        },
    }
}

/// Index over a few short biology facts, embedded with the state's embedder
pub async fn load_biology_index(state: &AppState) {
    let chunks = vec![
        chunk("Photosynthesis converts light energy into chemical energy in plants.", 0),
        chunk("Mitochondria are the powerhouse of the cell and produce ATP.", 1),
        chunk("Ribosomes synthesize proteins from messenger RNA.", 2),
        chunk("The Krebs cycle takes place in the mitochondria matrix.", 3),
    ];
    let index = DocumentIndex::from_chunks(chunks, state.embedder.as_ref())
        .await
        .unwrap();
    state.index_slot.replace(index).await;
}

/// Builds a PDF with one page per entry of `pages`, each page holding one
/// line of text per entry
pub fn build_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("Td", vec![0.into(), (-16).into()]));
            }
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

pub fn biology_pdf() -> Vec<u8> {
    build_pdf(&[
        &["Photosynthesis converts light energy", "into chemical energy in plants."],
        &["Mitochondria produce ATP for the cell."],
    ])
}

/// multipart/form-data POST to /upload carrying one file part
pub fn upload_request(field_name: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
            BOUNDARY, field_name, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn chat_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
