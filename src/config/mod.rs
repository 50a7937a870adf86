// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration from command-line flags and environment variables

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::documents::text_splitter::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::documents::RecursiveCharacterTextSplitter;
use crate::inference::{LlamaConfig, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::rag::qa_chain::DEFAULT_RETRIEVER_K;
use crate::rag::ConversationalQaChain;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Which embedder backs the document index
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingBackend {
    /// all-MiniLM-L6-v2 through ONNX Runtime
    Onnx,
    /// Feature hashing, needs no model files
    Hashing,
}

/// Document Chatter server
#[derive(Parser, Debug, Clone)]
#[command(name = "doc-chatter")]
#[command(version)]
#[command(about = "Chat with an uploaded PDF through retrieval-augmented generation", long_about = None)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "API_PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "EMBEDDING_BACKEND", value_enum, default_value_t = EmbeddingBackend::Onnx)]
    pub embedding_backend: EmbeddingBackend,

    #[arg(
        long,
        env = "EMBEDDING_MODEL_PATH",
        default_value = "./models/all-MiniLM-L6-v2-onnx/model.onnx"
    )]
    pub embedding_model_path: PathBuf,

    #[arg(
        long,
        env = "EMBEDDING_TOKENIZER_PATH",
        default_value = "./models/all-MiniLM-L6-v2-onnx/tokenizer.json"
    )]
    pub embedding_tokenizer_path: PathBuf,

    /// Dimension of the hashing embedder (ignored by the onnx backend)
    #[arg(long, env = "HASHING_DIMENSION", default_value_t = 384)]
    pub hashing_dimension: usize,

    /// GGUF language model used for answers
    #[arg(long, env = "MODEL_PATH", default_value = "./models/qa-model.gguf")]
    pub model_path: PathBuf,

    #[arg(long, env = "GPU_LAYERS", default_value_t = 0)]
    pub gpu_layers: u32,

    /// Context window of the language model in tokens
    #[arg(long, env = "MAX_CONTEXT_LENGTH", default_value_t = 2048)]
    pub context_size: usize,

    #[arg(long, env = "MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: usize,

    #[arg(long, env = "TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    #[arg(long, env = "CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,

    /// Number of chunks retrieved per question
    #[arg(long, env = "RETRIEVER_K", default_value_t = DEFAULT_RETRIEVER_K)]
    pub retriever_k: usize,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }
        if self.chunk_overlap > self.chunk_size {
            bail!(
                "chunk_overlap ({}) must not exceed chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.retriever_k == 0 {
            bail!("retriever_k must be at least 1");
        }
        if self.max_tokens == 0 {
            bail!("max_tokens must be at least 1");
        }
        if self.max_tokens >= self.context_size {
            bail!(
                "max_tokens ({}) must be smaller than the context size ({})",
                self.max_tokens,
                self.context_size
            );
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            bail!("temperature must be between 0.0 and 2.0, got {}", self.temperature);
        }
        if self.hashing_dimension == 0 {
            bail!("hashing_dimension must be greater than 0");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn splitter(&self) -> Result<RecursiveCharacterTextSplitter> {
        Ok(RecursiveCharacterTextSplitter::new(
            self.chunk_size,
            self.chunk_overlap,
        )?)
    }

    pub fn qa_chain(&self) -> ConversationalQaChain {
        ConversationalQaChain::new(self.retriever_k)
            .with_generation(self.max_tokens, self.temperature)
    }

    pub fn llama_config(&self) -> LlamaConfig {
        LlamaConfig {
            model_path: self.model_path.clone(),
            gpu_layers: self.gpu_layers,
            context_size: self.context_size,
            ..LlamaConfig::default()
        }
    }
}
