// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! PDF loading for uploaded documents
//!
//! Uploaded bytes are written to a named temporary file and the text is
//! extracted page by page with `pdf-extract`. The temporary file is removed
//! on every path, including extraction failures and parser panics.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{ChunkMetadata, DocumentPage};

/// Errors raised while turning an uploaded PDF into page text
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Upload contained no bytes
    #[error("Uploaded file is empty")]
    EmptyUpload,

    /// Temporary file could not be created or written
    #[error("Temporary file error: {0}")]
    TempFile(#[from] std::io::Error),

    /// The PDF could not be parsed
    #[error("Failed to extract text from PDF: {0}")]
    Extraction(String),

    /// The PDF parsed but no page contained any text
    #[error("PDF contains no extractable text")]
    NoText,
}

/// Returns true if the file name carries the `.pdf` extension
///
/// The check is case-sensitive: `report.PDF` is rejected.
pub fn is_pdf_filename(file_name: &str) -> bool {
    file_name.ends_with(".pdf")
}

/// Loads PDFs through a temporary file on disk
#[derive(Debug, Clone, Default)]
pub struct PdfLoader {
    temp_dir: Option<PathBuf>,
}

impl PdfLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place temporary files in `dir` instead of the system temp directory
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Extracts one `DocumentPage` per PDF page, in page order
    ///
    /// Extraction runs on a blocking thread since `pdf-extract` is
    /// synchronous and CPU-bound.
    pub async fn load(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<DocumentPage>, DocumentError> {
        if bytes.is_empty() {
            return Err(DocumentError::EmptyUpload);
        }

        let temp_dir = self.temp_dir.clone();
        let page_texts = tokio::task::spawn_blocking(move || {
            extract_pages_via_temp_file(temp_dir.as_deref(), &bytes)
        })
        .await
        .map_err(|e| DocumentError::Extraction(format!("extraction task failed: {}", e)))??;

        if page_texts.iter().all(|text| text.trim().is_empty()) {
            return Err(DocumentError::NoText);
        }

        let pages: Vec<DocumentPage> = page_texts
            .into_iter()
            .enumerate()
            .map(|(page, content)| DocumentPage {
                content,
                metadata: ChunkMetadata {
                    source: file_name.to_string(),
                    page,
                },
            })
            .collect();

        info!("Loaded {} pages from PDF {}", pages.len(), file_name);
        Ok(pages)
    }
}

/// Loads a PDF using the system temporary directory
pub async fn load_pdf_bytes(
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<Vec<DocumentPage>, DocumentError> {
    PdfLoader::new().load(file_name, bytes).await
}

fn extract_pages_via_temp_file(
    temp_dir: Option<&Path>,
    bytes: &[u8],
) -> Result<Vec<String>, DocumentError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("doc-chatter-").suffix(".pdf");
    let mut temp_file = match temp_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    temp_file.write_all(bytes)?;
    temp_file.flush()?;
    let temp_path = temp_file.path().to_path_buf();
    debug!("Wrote {} bytes to {}", bytes.len(), temp_path.display());

    // pdf-extract panics on some malformed inputs instead of returning an error
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(&temp_path)
    }));

    match temp_file.close() {
        Ok(()) => debug!("Temporary file {} removed", temp_path.display()),
        Err(e) => warn!(
            "Failed to remove temporary file {}: {}",
            temp_path.display(),
            e
        ),
    }

    match extracted {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(DocumentError::Extraction(e.to_string())),
        Err(_) => Err(DocumentError::Extraction(
            "PDF parser aborted on malformed input".to_string(),
        )),
    }
}
