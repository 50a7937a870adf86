// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /upload: PDF ingestion into the document index

pub mod handler;

pub use handler::{process_document, upload_handler, UPLOAD_SUCCESS_MESSAGE};
