// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use llama_cpp_2::{
    context::params::LlamaContextParams,
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{params::LlamaModelParams, AddBos, LlamaModel, Special},
    sampling::LlamaSampler,
    token::LlamaToken,
};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{GenerationOutput, GenerationRequest, TextGenerator};

/// Sanitize prompt text for tokenization
///
/// Removes characters that cause issues with C string handling in llama.cpp:
/// - Null bytes (\0) - C strings use null as terminator
/// - Other C0 control characters except tab, newline and carriage return
///
/// Prompts carry text extracted from PDFs, which regularly contains both.
fn sanitize_prompt_for_tokenizer(prompt: &str) -> String {
    prompt
        .chars()
        .filter(|c| *c != '\0' && (*c >= ' ' || *c == '\t' || *c == '\n' || *c == '\r'))
        .collect()
}

/// Keeps the leading BOS token and the tail of the prompt so that at most
/// `budget` tokens remain. The question sits at the end of the prompt, so
/// the oldest context is dropped first.
fn fit_prompt_to_budget(tokens: Vec<LlamaToken>, budget: usize) -> Vec<LlamaToken> {
    if tokens.len() <= budget || budget == 0 {
        return tokens;
    }

    let mut fitted = Vec::with_capacity(budget);
    fitted.push(tokens[0]);
    let tail_len = budget - 1;
    fitted.extend_from_slice(&tokens[tokens.len() - tail_len..]);
    fitted
}

#[derive(Debug, Clone)]
pub struct LlamaConfig {
    pub model_path: PathBuf,
    pub gpu_layers: u32,
    pub context_size: usize,
    pub batch_size: usize,
    pub max_concurrent_inferences: usize,
    pub seed: u32,
}

impl Default for LlamaConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/qa-model.gguf"),
            gpu_layers: 0,
            context_size: 2048,
            batch_size: std::env::var("LLAMA_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(512),
            max_concurrent_inferences: 1,
            seed: 1234,
        }
    }
}

/// GGUF language model served through llama.cpp
///
/// The backend and weights are loaded once; every request gets a fresh
/// context on a blocking thread.
#[derive(Clone)]
pub struct LlamaGenerator {
    backend: Arc<LlamaBackend>,
    model: Arc<LlamaModel>,
    config: LlamaConfig,
    model_name: String,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for LlamaGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaGenerator")
            .field("model_name", &self.model_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LlamaGenerator {
    pub async fn load(config: LlamaConfig) -> Result<Self> {
        if !config.model_path.exists() {
            anyhow::bail!("GGUF model file not found: {}", config.model_path.display());
        }

        let model_name = config
            .model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "llama".to_string());

        let load_config = config.clone();
        let (backend, model) = tokio::task::spawn_blocking(move || -> Result<_> {
            let backend = LlamaBackend::init()
                .map_err(|e| anyhow!("Failed to initialize backend: {:?}", e))?;

            let model_params =
                LlamaModelParams::default().with_n_gpu_layers(load_config.gpu_layers);
            let model =
                LlamaModel::load_from_file(&backend, &load_config.model_path, &model_params)
                    .map_err(|e| anyhow!("Failed to load model: {:?}", e))?;

            Ok((backend, model))
        })
        .await
        .map_err(|e| anyhow!("Model loading task failed: {}", e))??;

        info!(
            "Language model {} loaded (context {}, gpu layers {})",
            model_name, config.context_size, config.gpu_layers
        );

        let permits = Arc::new(Semaphore::new(config.max_concurrent_inferences.max(1)));
        Ok(Self {
            backend: Arc::new(backend),
            model: Arc::new(model),
            config,
            model_name,
            permits,
        })
    }
}

fn generate_blocking(
    backend: &LlamaBackend,
    model: &LlamaModel,
    config: &LlamaConfig,
    request: &GenerationRequest,
) -> Result<GenerationOutput> {
    let start_time = Instant::now();

    let sanitized_prompt = sanitize_prompt_for_tokenizer(&request.prompt);
    if sanitized_prompt.len() != request.prompt.len() {
        warn!(
            "Sanitized prompt: removed {} problematic bytes",
            request.prompt.len() - sanitized_prompt.len()
        );
    }

    let prompt_tokens = model
        .str_to_token(&sanitized_prompt, AddBos::Always)
        .map_err(|e| anyhow!("Failed to tokenize: {:?}", e))?;

    if config.context_size <= request.max_tokens {
        return Err(anyhow!(
            "Context size {} leaves no room for the prompt with max_tokens {}",
            config.context_size,
            request.max_tokens
        ));
    }
    let prompt_budget = config.context_size - request.max_tokens;
    let original_len = prompt_tokens.len();
    let prompt_tokens = fit_prompt_to_budget(prompt_tokens, prompt_budget);
    if prompt_tokens.len() < original_len {
        warn!(
            "Prompt truncated from {} to {} tokens to fit the context window",
            original_len,
            prompt_tokens.len()
        );
    }

    let n_batch = config.batch_size.max(prompt_tokens.len());
    let ctx_params = LlamaContextParams::default()
        .with_n_ctx(NonZeroU32::new(config.context_size as u32))
        .with_n_batch(n_batch as u32);

    let mut context = model
        .new_context(backend, ctx_params)
        .map_err(|e| anyhow!("Failed to create context: {:?}", e))?;

    let mut batch = LlamaBatch::new(n_batch, 1);
    let last_index = prompt_tokens.len().saturating_sub(1);
    for (i, &token) in prompt_tokens.iter().enumerate() {
        batch
            .add(token, i as i32, &[0], i == last_index)
            .map_err(|e| anyhow!("Failed to add token to batch: {:?}", e))?;
    }
    context
        .decode(&mut batch)
        .map_err(|e| anyhow!("Decode failed: {:?}", e))?;

    let mut sampler = if request.temperature <= 0.0 {
        LlamaSampler::greedy()
    } else {
        LlamaSampler::chain_simple([
            LlamaSampler::temp(request.temperature),
            LlamaSampler::top_p(request.top_p, 1),
            LlamaSampler::dist(config.seed),
        ])
    };

    let eos_token = model.token_eos();
    let mut output = String::new();
    let mut n_cur = prompt_tokens.len();
    let limit = prompt_tokens.len() + request.max_tokens;
    let mut finish_reason = "length";

    while n_cur < limit {
        let token = sampler.sample(&context, -1);

        if token == eos_token {
            finish_reason = "eos";
            break;
        }

        // Invalid UTF-8 pieces are dropped from the output but the token
        // must still be decoded to advance the model state
        match model.token_to_str(token, Special::Plaintext) {
            Ok(piece) => output.push_str(&piece),
            Err(e) => debug!("Skipping token {} with invalid UTF-8: {:?}", token, e),
        }

        batch.clear();
        batch
            .add(token, n_cur as i32, &[0], true)
            .map_err(|e| anyhow!("Failed to add token: {:?}", e))?;
        context
            .decode(&mut batch)
            .map_err(|e| anyhow!("Decode failed: {:?}", e))?;

        n_cur += 1;
    }

    let tokens_generated = n_cur - prompt_tokens.len();
    let generation_time = start_time.elapsed();
    info!(
        "Generation ended: prompt_tokens={}, tokens_generated={}, finish_reason={}, {:?}",
        prompt_tokens.len(),
        tokens_generated,
        finish_reason,
        generation_time
    );

    Ok(GenerationOutput {
        text: output,
        prompt_tokens: prompt_tokens.len(),
        tokens_generated,
        generation_time,
        finish_reason: finish_reason.to_string(),
    })
}

#[async_trait]
impl TextGenerator for LlamaGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| anyhow!("Inference queue closed: {}", e))?;

        let backend = self.backend.clone();
        let model = self.model.clone();
        let config = self.config.clone();
        let request = request.clone();

        tokio::task::spawn_blocking(move || generate_blocking(&backend, &model, &config, &request))
            .await
            .map_err(|e| anyhow!("Inference task failed: {}", e))?
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
