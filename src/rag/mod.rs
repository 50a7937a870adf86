// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// RAG (Retrieval-Augmented Generation) module
// In-memory vector index for the uploaded document plus the question-answering chain

pub mod errors;
pub mod index_slot;
pub mod qa_chain;
pub mod vector_index;

pub use errors::IndexError;
pub use index_slot::IndexSlot;
pub use qa_chain::{ChatTurn, ConversationalQaChain, QaAnswer};
pub use vector_index::{cosine_similarity, DocumentIndex, IndexEntry, SearchHit};
