// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LSP subsystem errors.

use mayla_core::Language;
use thiserror::Error;

/// Errors from LSP process management and the wire client.
#[derive(Debug, Error)]
pub enum LspError {
    #[error("no language server configured for {0}")]
    NoServer(Language),

    #[error("{command} is not installed (needed for {language})")]
    NotInstalled { language: Language, command: String },

    #[error("language server for {0} is unavailable (circuit open)")]
    Unavailable(Language),

    #[error("failed to start {language} server: {message}")]
    StartFailed { language: Language, message: String },

    #[error("restart limit reached for {0}")]
    RestartLimit(Language),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("server returned an error: {0}")]
    ServerError(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("server connection closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
