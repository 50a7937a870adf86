// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Conversational question answering over the document index
//!
//! 1. With prior turns, condense the follow-up into a standalone question
//! 2. Retrieve the top-k chunks for the standalone question
//! 3. "Stuff" the chunk contents into the QA prompt and generate the answer

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::vector_index::DocumentIndex;
use crate::documents::DocumentChunk;
use crate::embeddings::Embedder;
use crate::inference::{
    GenerationRequest, TextGenerator, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};

pub const DEFAULT_RETRIEVER_K: usize = 3;

const QA_PROMPT_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n{context}\n\nQuestion: {question}\nHelpful Answer:";

const CONDENSE_QUESTION_TEMPLATE: &str = "Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question, in its original language.\n\nChat History:\n{chat_history}\nFollow Up Input: {question}\nStandalone question:";

/// One earlier exchange: (human question, assistant answer)
pub type ChatTurn = (String, String);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    /// Question actually used for retrieval (condensed when history exists)
    pub generated_question: String,
    pub source_documents: Vec<DocumentChunk>,
}

#[derive(Debug, Clone)]
pub struct ConversationalQaChain {
    retriever_k: usize,
    return_source_documents: bool,
    max_tokens: usize,
    temperature: f32,
}

impl Default for ConversationalQaChain {
    fn default() -> Self {
        Self {
            retriever_k: DEFAULT_RETRIEVER_K,
            return_source_documents: true,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

pub fn format_chat_history(chat_history: &[ChatTurn]) -> String {
    chat_history
        .iter()
        .map(|(question, answer)| format!("\nHuman: {}\nAssistant: {}", question, answer))
        .collect()
}

pub fn build_condense_prompt(question: &str, chat_history: &[ChatTurn]) -> String {
    fill_template(
        CONDENSE_QUESTION_TEMPLATE,
        &[
            ("chat_history", format_chat_history(chat_history).as_str()),
            ("question", question),
        ],
    )
}

pub fn build_qa_prompt(question: &str, documents: &[DocumentChunk]) -> String {
    let context = documents
        .iter()
        .map(|doc| doc.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    fill_template(
        QA_PROMPT_TEMPLATE,
        &[("context", context.as_str()), ("question", question)],
    )
}

/// Substitutes `{name}` placeholders in one pass; inserted values are never rescanned
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        filled.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let placeholder = values.iter().find(|(name, _)| {
            tail.strip_prefix(*name).map_or(false, |after| after.starts_with('}'))
        });

        match placeholder {
            Some((name, value)) => {
                filled.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                filled.push('{');
                rest = tail;
            }
        }
    }

    filled.push_str(rest);
    filled
}

impl ConversationalQaChain {
    pub fn new(retriever_k: usize) -> Self {
        Self {
            retriever_k,
            ..Self::default()
        }
    }

    pub fn with_return_source_documents(mut self, enabled: bool) -> Self {
        self.return_source_documents = enabled;
        self
    }

    pub fn with_generation(mut self, max_tokens: usize, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn retriever_k(&self) -> usize {
        self.retriever_k
    }

    fn generation_request(&self, prompt: String) -> GenerationRequest {
        GenerationRequest::new(prompt)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }

    async fn standalone_question(
        &self,
        question: &str,
        chat_history: &[ChatTurn],
        generator: &dyn TextGenerator,
    ) -> Result<String> {
        if chat_history.is_empty() {
            return Ok(question.to_string());
        }

        let prompt = build_condense_prompt(question, chat_history);
        let output = generator
            .generate(&self.generation_request(prompt))
            .await
            .context("Failed to condense follow-up question")?;

        let condensed = output.text.trim();
        if condensed.is_empty() {
            Ok(question.to_string())
        } else {
            debug!("Condensed follow-up question to: {}", condensed);
            Ok(condensed.to_string())
        }
    }

    pub async fn ask(
        &self,
        question: &str,
        chat_history: &[ChatTurn],
        index: &DocumentIndex,
        embedder: &dyn Embedder,
        generator: &dyn TextGenerator,
    ) -> Result<QaAnswer> {
        let generated_question = self
            .standalone_question(question, chat_history, generator)
            .await?;

        let hits = index
            .similarity_search(&generated_question, self.retriever_k, embedder)
            .await
            .context("Failed to retrieve relevant chunks")?;
        let documents: Vec<DocumentChunk> = hits.into_iter().map(|hit| hit.chunk).collect();

        let prompt = build_qa_prompt(&generated_question, &documents);
        let output = generator
            .generate(&self.generation_request(prompt))
            .await
            .context("Failed to generate answer")?;

        info!(
            "Answered question with {} source chunks ({} tokens generated)",
            documents.len(),
            output.tokens_generated
        );

        Ok(QaAnswer {
            answer: output.text.trim().to_string(),
            generated_question,
            source_documents: if self.return_source_documents {
                documents
            } else {
                Vec::new()
            },
        })
    }
}
