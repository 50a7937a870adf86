// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// In-memory vector index over the chunks of the uploaded document
// Built once per upload, never mutated afterwards, searched by cosine similarity

use std::time::Instant;
use tracing::{debug, info};

use super::errors::IndexError;
use crate::documents::DocumentChunk;
use crate::embeddings::Embedder;

/// Number of chunks embedded per call while building the index
const BUILD_BATCH_SIZE: usize = 64;

/// Entry stored in the index
#[derive(Clone, Debug)]
pub struct IndexEntry {
    pub chunk: DocumentChunk,
    pub vector: Vec<f32>,
}

/// Result from similarity search
#[derive(Clone, Debug)]
pub struct SearchHit {
    /// Position of the entry in the index (insertion order)
    pub position: usize,
    pub score: f32,
    pub chunk: DocumentChunk,
}

/// Immutable similarity index for a single document
#[derive(Debug)]
pub struct DocumentIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
    embedding_model: String,
    created_at: Instant,
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        0.0
    } else {
        dot_product / (magnitude_a * magnitude_b)
    }
}

fn validate_vector(vector: &[f32], dimension: usize, position: usize) -> Result<(), IndexError> {
    if vector.len() != dimension {
        return Err(IndexError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(IndexError::NonFiniteVector(position));
    }
    Ok(())
}

impl DocumentIndex {
    /// Builds an index from pre-computed vectors
    ///
    /// # Returns
    /// * `Err(IndexError::Empty)` if there are no chunks
    /// * `Err` if any vector has the wrong dimension or non-finite values
    pub fn from_vectors(
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f32>>,
        dimension: usize,
        embedding_model: impl Into<String>,
    ) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::Empty);
        }
        if chunks.len() != vectors.len() {
            return Err(IndexError::VectorCountMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }

        for (position, vector) in vectors.iter().enumerate() {
            validate_vector(vector, dimension, position)?;
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        Ok(Self {
            entries,
            dimension,
            embedding_model: embedding_model.into(),
            created_at: Instant::now(),
        })
    }

    /// Embeds every chunk and builds the index
    pub async fn from_chunks(
        chunks: Vec<DocumentChunk>,
        embedder: &dyn Embedder,
    ) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::Empty);
        }

        let start = Instant::now();
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(BUILD_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let batch_vectors = embedder
                .embed_batch(&texts)
                .await
                .map_err(IndexError::Embedding)?;
            vectors.extend(batch_vectors);
        }

        let index = Self::from_vectors(
            chunks,
            vectors,
            embedder.dimension(),
            embedder.model_name(),
        )?;

        info!(
            "Built document index: {} chunks, {}D, {:?}",
            index.len(),
            index.dimension(),
            start.elapsed()
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Top-k entries by cosine similarity, highest score first
    ///
    /// Ties keep insertion order. `k == 0` returns nothing and `k` larger
    /// than the index returns every entry.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(query, &entry.vector)))
            .collect();

        // Stable sort, so equal scores stay in insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchHit {
                position,
                score,
                chunk: self.entries[position].chunk.clone(),
            })
            .collect())
    }

    /// Embeds `query` and returns the top-k most similar chunks
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let query_vector = embedder.embed(query).await.map_err(IndexError::Embedding)?;
        let hits = self.search(&query_vector, k)?;
        debug!(
            "Similarity search returned {} hits (top score: {:?})",
            hits.len(),
            hits.first().map(|h| h.score)
        );
        Ok(hits)
    }
}
