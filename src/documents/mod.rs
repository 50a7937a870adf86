// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Document ingestion: PDF text extraction and chunking for the vector index

pub mod pdf_loader;
pub mod text_splitter;

pub use pdf_loader::{is_pdf_filename, load_pdf_bytes, DocumentError, PdfLoader};
pub use text_splitter::{RecursiveCharacterTextSplitter, SplitterError};

use serde::{Deserialize, Serialize};

/// Where a piece of text came from in the uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Uploaded file name
    pub source: String,
    /// 0-based page number
    pub page: usize,
}

/// Text of a single PDF page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPage {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A chunk of page text, the unit that gets embedded and retrieved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}
