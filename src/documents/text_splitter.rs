// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Recursive character text splitter
//!
//! Splits text on the first separator present (paragraphs, then lines,
//! then words, then characters), merges the pieces back into chunks of at
//! most `chunk_size` characters, and carries up to `chunk_overlap`
//! characters of trailing context into the next chunk. Pieces that are
//! still too long are split again with the remaining separators.

use thiserror::Error;
use tracing::{debug, warn};

use super::{DocumentChunk, DocumentPage};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplitterError {
    #[error("chunk_size must be greater than 0")]
    ZeroChunkSize,

    #[error("chunk_overlap ({overlap}) is larger than chunk_size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

#[derive(Debug, Clone)]
pub struct RecursiveCharacterTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
    keep_separator: bool,
}

impl Default for RecursiveCharacterTextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: default_separators(),
            keep_separator: true,
        }
    }
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", " ", ""]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Lengths are measured in characters, not bytes
fn text_len(text: &str) -> usize {
    text.chars().count()
}

impl RecursiveCharacterTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        if chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        if chunk_overlap > chunk_size {
            return Err(SplitterError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        })
    }

    /// Replace the separator list (highest priority first)
    pub fn with_separators<S: Into<String>>(mut self, separators: Vec<S>) -> Self {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Whether separators stay attached to the piece that follows them
    pub fn with_keep_separator(mut self, keep: bool) -> Self {
        self.keep_separator = keep;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Splits every page, copying the page metadata onto its chunks
    pub fn split_documents(&self, pages: &[DocumentPage]) -> Vec<DocumentChunk> {
        let chunks: Vec<DocumentChunk> = pages
            .iter()
            .flat_map(|page| {
                self.split_text(&page.content)
                    .into_iter()
                    .map(move |content| DocumentChunk {
                        content,
                        metadata: page.metadata.clone(),
                    })
            })
            .collect();

        debug!("Split {} pages into {} chunks", pages.len(), chunks.len());
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // First separator present in the text wins; "" always matches
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits = split_with_separator(text, separator, self.keep_separator);
        let merge_separator = if self.keep_separator { "" } else { separator };

        let mut final_chunks = Vec::new();
        let mut good_splits: Vec<String> = Vec::new();

        for split in splits {
            if text_len(&split) < self.chunk_size {
                good_splits.push(split);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits, merge_separator));
                good_splits.clear();
            }

            if remaining.is_empty() {
                final_chunks.push(split);
            } else {
                final_chunks.extend(self.split_recursive(&split, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits, merge_separator));
        }

        final_chunks
    }

    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let separator_len = text_len(separator);
        let mut docs = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for split in splits {
            let len = text_len(split);
            let joiner_len = if current.is_empty() { 0 } else { separator_len };

            if total + len + joiner_len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(doc) = join_pieces(&current, separator) {
                        docs.push(doc);
                    }

                    // Drop from the front until only the overlap window remains
                    while !current.is_empty()
                        && (total > self.chunk_overlap
                            || (total + len + separator_len > self.chunk_size && total > 0))
                    {
                        let dropped = text_len(current[0])
                            + if current.len() > 1 { separator_len } else { 0 };
                        total = total.saturating_sub(dropped);
                        current.remove(0);
                    }
                }
            }

            current.push(split.as_str());
            total += len + if current.len() > 1 { separator_len } else { 0 };
        }

        if let Some(doc) = join_pieces(&current, separator) {
            docs.push(doc);
        }

        docs
    }
}

fn join_pieces(pieces: &[&str], separator: &str) -> Option<String> {
    let joined = pieces.join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Splits on a literal separator. With `keep_separator`, the separator is
/// prefixed to the piece that follows it. Empty pieces are dropped.
fn split_with_separator(text: &str, separator: &str, keep_separator: bool) -> Vec<String> {
    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else if keep_separator {
        text.split(separator)
            .enumerate()
            .map(|(i, piece)| {
                if i == 0 {
                    piece.to_string()
                } else {
                    format!("{}{}", separator, piece)
                }
            })
            .collect()
    } else {
        text.split(separator).map(str::to_string).collect()
    };

    pieces.into_iter().filter(|p| !p.is_empty()).collect()
}
