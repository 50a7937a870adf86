// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod documents;
pub mod embeddings;
pub mod inference;
pub mod rag;
pub mod version;

pub use api::{create_app, AppState};
pub use config::{EmbeddingBackend, ServerConfig};
pub use documents::{DocumentChunk, DocumentPage, RecursiveCharacterTextSplitter};
pub use embeddings::{Embedder, HashingEmbedder, OnnxEmbeddingModel};
pub use inference::{GenerationRequest, LlamaConfig, LlamaGenerator, TextGenerator};
pub use rag::{ConversationalQaChain, DocumentIndex, IndexSlot};
