// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod chat;
pub mod errors;
pub mod handlers;
pub mod http_server;
pub mod upload;

pub use chat::{chat_handler, ChatRequest, ChatResponse};
pub use errors::{ApiError, ErrorResponse};
pub use handlers::{HealthResponse, MessageResponse};
pub use http_server::{create_app, start_server, AppState};
pub use upload::{process_document, upload_handler};
