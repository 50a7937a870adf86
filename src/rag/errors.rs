// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for building and querying the document index

use thiserror::Error;

/// Errors that can occur while building or searching a `DocumentIndex`
#[derive(Error, Debug)]
pub enum IndexError {
    /// No chunks were supplied, so there is nothing to index
    #[error("Cannot build an index from zero chunks")]
    Empty,

    /// Embedder returned a different number of vectors than chunks
    #[error("Embedder returned {actual} vectors for {expected} chunks")]
    VectorCountMismatch { expected: usize, actual: usize },

    /// Vector dimensions don't match the index dimension
    #[error("Invalid vector dimensions: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector contains NaN or Infinity (would break similarity calculations)
    #[error("Invalid vector values at entry {0}: contains NaN or Infinity")]
    NonFiniteVector(usize),

    /// Embedding the chunks or the query failed
    #[error("Embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),
}
