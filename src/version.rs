// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for Document Chatter

/// Semantic version number
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "pdf-upload",
    "recursive-text-splitting",
    "onnx-embeddings",
    "hashing-embeddings",
    "cosine-retrieval",
    "conversational-qa",
    "gguf-generation",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Document Chatter {} ({})", VERSION, NAME)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "name": NAME,
        "version": VERSION,
        "features": FEATURES,
    })
}
