// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Wrapper
//!
//! Runs the all-MiniLM-L6-v2 sentence transformer through ONNX Runtime to
//! embed document chunks and chat questions.
//!
//! Features:
//! - ONNX model loading from disk
//! - GPU acceleration via CUDA (with automatic CPU fallback)
//! - BERT tokenization with truncation to 256 tokens
//! - Batched inference with attention-masked mean pooling
//! - L2-normalized 384-dimensional output vectors

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ndarray::{Array2, Axis};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

use super::{l2_normalize, Embedder};

/// Output dimension of all-MiniLM-L6-v2
pub const MINILM_DIMENSION: usize = 384;

/// all-MiniLM-L6-v2 was trained with 256-token inputs
pub const MINILM_MAX_LENGTH: usize = 256;

const DEFAULT_BATCH_SIZE: usize = 32;

/// ONNX-based embedding model (all-MiniLM-L6-v2)
///
/// # Thread Safety
/// The session sits behind `Arc<Mutex>` because `Session::run` needs
/// `&mut self`; clones share the same session.
#[derive(Clone)]
pub struct OnnxEmbeddingModel {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    model_name: String,
    dimension: usize,
    max_length: usize,
    batch_size: usize,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("max_length", &self.max_length)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

fn build_session(model_path: &Path) -> Result<Session> {
    info!("Initializing ONNX embedding model");
    info!("   Attempting CUDA execution provider...");

    let cuda_result = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CUDAExecutionProvider::default().build()])
        .context("Failed to set CUDA execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(4)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path);

    match cuda_result {
        Ok(session) => {
            info!("CUDA execution provider initialized");
            Ok(session)
        }
        Err(e) => {
            warn!("CUDA execution provider failed: {}", e);
            warn!("   Falling back to CPU execution provider");
            Session::builder()
                .context("Failed to create session builder")?
                .with_execution_providers([CPUExecutionProvider::default().build()])
                .context("Failed to set CPU execution provider")?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .context("Failed to set optimization level")?
                .with_intra_threads(4)
                .context("Failed to set intra threads")?
                .commit_from_file(model_path)
                .context(format!(
                    "Failed to load ONNX model from {}",
                    model_path.display()
                ))
        }
    }
}

/// Runs one padded batch through the session and mean-pools each row
///
/// Returns raw (unnormalized) sentence vectors plus the hidden size the
/// model produced.
fn run_pooled_batch(session: &mut Session, encodings: &[Encoding]) -> Result<Vec<Vec<f32>>> {
    let batch = encodings.len();
    let max_len = encodings
        .iter()
        .map(|enc| enc.get_ids().len())
        .max()
        .unwrap_or(0);

    if max_len == 0 {
        return Err(anyhow!("Tokenizer produced no tokens"));
    }

    let mut input_ids = Vec::with_capacity(batch * max_len);
    let mut attention_mask = Vec::with_capacity(batch * max_len);

    for encoding in encodings {
        let ids = encoding.get_ids();
        let mask = encoding.get_attention_mask();
        let padding = max_len - ids.len();

        input_ids.extend(ids.iter().map(|&id| id as i64));
        input_ids.extend(std::iter::repeat(0i64).take(padding));
        attention_mask.extend(mask.iter().map(|&m| m as i64));
        attention_mask.extend(std::iter::repeat(0i64).take(padding));
    }

    let mask_for_pooling = attention_mask.clone();

    let input_ids_array = Array2::from_shape_vec((batch, max_len), input_ids)
        .context("Failed to create input_ids array")?;
    let attention_mask_array = Array2::from_shape_vec((batch, max_len), attention_mask)
        .context("Failed to create attention_mask array")?;
    // Single-segment inputs: token types are all zero
    let token_type_ids_array = Array2::<i64>::zeros((batch, max_len));

    let outputs = session.run(ort::inputs![
        "input_ids" => Value::from_array(input_ids_array)?,
        "attention_mask" => Value::from_array(attention_mask_array)?,
        "token_type_ids" => Value::from_array(token_type_ids_array)?
    ])?;

    // Different exports name the output differently; position 0 is the
    // token embedding tensor [batch, seq_len, hidden_dim]
    let output = outputs[0]
        .try_extract_array::<f32>()
        .context("Failed to extract output tensor")?;

    if output.shape().len() != 3 {
        return Err(anyhow!(
            "Model outputs unexpected shape: {:?} (expected [batch, seq_len, hidden])",
            output.shape()
        ));
    }

    let mut pooled_batch = Vec::with_capacity(batch);
    for row in 0..batch {
        let tokens = output.index_axis(Axis(0), row);
        let seq_len = tokens.shape()[0];
        let hidden_dim = tokens.shape()[1];
        let row_mask = &mask_for_pooling[row * max_len..(row + 1) * max_len];

        let mut pooled = vec![0.0f32; hidden_dim];
        let mut mask_sum = 0.0f32;
        for i in 0..seq_len {
            let weight = row_mask[i] as f32;
            mask_sum += weight;
            for j in 0..hidden_dim {
                pooled[j] += tokens[[i, j]] * weight;
            }
        }
        for value in &mut pooled {
            *value /= mask_sum.max(1e-9);
        }

        pooled_batch.push(pooled);
    }

    Ok(pooled_batch)
}

impl OnnxEmbeddingModel {
    /// Loads the model and tokenizer, then validates the output dimension
    /// with a sample inference
    ///
    /// # Errors
    /// - Model or tokenizer file missing or invalid
    /// - ONNX Runtime initialization fails
    /// - Model does not output 384 dimensions
    pub async fn new<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        tokenizer_path: P,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        let mut session = build_session(model_path)?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MINILM_MAX_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
        // Padding is done per batch in run_pooled_batch
        tokenizer.with_padding(None);

        let sample = tokenizer
            .encode("validation test", true)
            .map_err(|e| anyhow!("Tokenizer validation failed: {}", e))?;
        let sample_output = run_pooled_batch(&mut session, &[sample])?;
        let sample_dim = sample_output.first().map(Vec::len).unwrap_or(0);
        if sample_dim != MINILM_DIMENSION {
            anyhow::bail!(
                "Model outputs {} dimensions (expected {})",
                sample_dim,
                MINILM_DIMENSION
            );
        }

        info!(
            "ONNX embedding model {} loaded ({} dimensions)",
            model_name, MINILM_DIMENSION
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_name,
            dimension: MINILM_DIMENSION,
            max_length: MINILM_MAX_LENGTH,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Number of texts sent to ONNX Runtime per inference call
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn encode_all(&self, texts: &[String]) -> Result<Vec<Encoding>> {
        texts
            .iter()
            .map(|text| {
                self.tokenizer
                    .encode(text.as_str(), true)
                    .map_err(|e| anyhow!("Tokenization failed: {}", e))
            })
            .collect()
    }

    fn embed_encodings(&self, encodings: &[Encoding]) -> Result<Vec<Vec<f32>>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("ONNX session lock poisoned"))?;

        let mut embeddings = Vec::with_capacity(encodings.len());
        for batch in encodings.chunks(self.batch_size) {
            for mut pooled in run_pooled_batch(&mut session, batch)? {
                if pooled.len() != self.dimension {
                    anyhow::bail!(
                        "Unexpected embedding dimension: {} (expected {})",
                        pooled.len(),
                        self.dimension
                    );
                }
                l2_normalize(&mut pooled);
                embeddings.push(pooled);
            }
        }

        Ok(embeddings)
    }

    /// Counts tokens in a text string, after truncation
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        Ok(encoding.get_attention_mask().iter().map(|&m| m as usize).sum())
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

#[async_trait]
impl Embedder for OnnxEmbeddingModel {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow!("Embedding model returned no vector"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self.encode_all(texts)?;
        debug!(
            "Embedding {} texts in batches of {}",
            texts.len(),
            self.batch_size
        );
        self.embed_encodings(&encodings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
