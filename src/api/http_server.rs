// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::chat::{chat_handler, chat_options_handler};
use super::handlers::{health_handler, root_handler};
use super::upload::upload_handler;
use crate::config::{ServerConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::documents::{PdfLoader, RecursiveCharacterTextSplitter};
use crate::embeddings::Embedder;
use crate::inference::TextGenerator;
use crate::rag::{ConversationalQaChain, IndexSlot};

/// Shared state behind every handler
///
/// The embedder and generator are loaded once at startup. The index slot
/// starts empty and is replaced by each successful upload.
pub struct AppState {
    pub index_slot: IndexSlot,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn TextGenerator>,
    pub splitter: RecursiveCharacterTextSplitter,
    pub qa_chain: ConversationalQaChain,
    pub pdf_loader: PdfLoader,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// State with default chunking, retrieval and upload settings
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            index_slot: IndexSlot::new(),
            embedder,
            generator,
            splitter: RecursiveCharacterTextSplitter::default(),
            qa_chain: ConversationalQaChain::default(),
            pdf_loader: PdfLoader::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn from_config(
        config: &ServerConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        Ok(Self {
            splitter: config.splitter()?,
            qa_chain: config.qa_chain(),
            max_upload_bytes: config.max_upload_bytes,
            ..Self::new(embedder, generator)
        })
    }

    pub fn with_splitter(mut self, splitter: RecursiveCharacterTextSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_qa_chain(mut self, qa_chain: ConversationalQaChain) -> Self {
        self.qa_chain = qa_chain;
        self
    }

    pub fn with_pdf_loader(mut self, pdf_loader: PdfLoader) -> Self {
        self.pdf_loader = pdf_loader;
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(root_handler))
        .route("/upload", post(upload_handler))
        .route("/chat", post(chat_handler).options(chat_options_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API until `shutdown` resolves
pub async fn start_server<F>(state: Arc<AppState>, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    Ok(())
}
