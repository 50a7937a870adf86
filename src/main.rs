// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use doc_chatter::{
    api::{start_server, AppState},
    config::{EmbeddingBackend, ServerConfig},
    embeddings::{Embedder, HashingEmbedder, OnnxEmbeddingModel},
    inference::{LlamaGenerator, TextGenerator},
    version,
};
use std::{env, sync::Arc};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const ONNX_MODEL_NAME: &str = "all-MiniLM-L6-v2";

#[tokio::main]
async fn main() -> Result<()> {
    // .env is read before the flags so its values act as env defaults
    dotenv::dotenv().ok();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::parse();
    config.validate().context("Invalid configuration")?;

    info!("Starting {}", version::get_version_string());
    info!(
        "Chunking: size={} overlap={}, retriever k={}, max upload {} bytes",
        config.chunk_size, config.chunk_overlap, config.retriever_k, config.max_upload_bytes
    );

    let embedder = load_embedder(&config).await?;

    info!("Loading language model from {}", config.model_path.display());
    let generator: Arc<dyn TextGenerator> = Arc::new(
        LlamaGenerator::load(config.llama_config())
            .await
            .context("Failed to load language model")?,
    );

    let state = Arc::new(AppState::from_config(&config, embedder, generator)?);
    let addr = config.socket_addr()?;

    start_server(state, addr, shutdown_signal()).await
}

async fn load_embedder(config: &ServerConfig) -> Result<Arc<dyn Embedder>> {
    match config.embedding_backend {
        EmbeddingBackend::Onnx => {
            info!(
                "Loading ONNX embedding model from {}",
                config.embedding_model_path.display()
            );
            let model = OnnxEmbeddingModel::new(
                ONNX_MODEL_NAME,
                &config.embedding_model_path,
                &config.embedding_tokenizer_path,
            )
            .await
            .context("Failed to load embedding model")?;
            Ok(Arc::new(model))
        }
        EmbeddingBackend::Hashing => {
            info!(
                "Using feature-hashing embeddings ({} dimensions)",
                config.hashing_dimension
            );
            Ok(Arc::new(HashingEmbedder::new(config.hashing_dimension)?))
        }
    }
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
