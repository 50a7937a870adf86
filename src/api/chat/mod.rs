// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /chat: conversational question answering over the uploaded PDF

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{chat_handler, chat_options_handler};
pub use request::ChatRequest;
pub use response::{ChatResponse, NO_DOCUMENT_MESSAGE};
