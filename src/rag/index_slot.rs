// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Process-wide holder for the current document index
// Uploads swap in a fully built index; queries keep whatever Arc they cloned

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::vector_index::DocumentIndex;

#[derive(Debug, Default, Clone)]
pub struct IndexSlot {
    current: Arc<RwLock<Option<Arc<DocumentIndex>>>>,
}

impl IndexSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The index queries should run against, if a document was uploaded
    pub async fn current(&self) -> Option<Arc<DocumentIndex>> {
        self.current.read().await.clone()
    }

    /// Replaces the current index wholesale, returning the previous one
    pub async fn replace(&self, index: DocumentIndex) -> Option<Arc<DocumentIndex>> {
        let chunks = index.len();
        let previous = self.current.write().await.replace(Arc::new(index));
        info!(
            "Document index replaced ({} chunks, previous index: {})",
            chunks,
            if previous.is_some() { "dropped" } else { "none" }
        );
        previous
    }

    pub async fn clear(&self) -> Option<Arc<DocumentIndex>> {
        self.current.write().await.take()
    }

    pub async fn is_loaded(&self) -> bool {
        self.current.read().await.is_some()
    }
}
