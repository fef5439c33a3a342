// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Query inputs and the result envelope.

use std::path::PathBuf;
use std::time::Duration;

use mayla_core::RefKind;
use serde::Serialize;

/// Knobs common to both cascades.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Total budget across all tiers.
    pub deadline: Duration,
    pub max_results: usize,
    pub skip_index: bool,
    pub skip_lsp: bool,
    /// Whether the regex tier may run at all.
    pub allow_fallback: bool,
    /// Write LSP results back into the index.
    pub update_index: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(10),
            max_results: 100,
            skip_index: false,
            skip_lsp: false,
            allow_fallback: true,
            update_index: true,
        }
    }
}

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuerySource {
    Index,
    Lsp,
    Regex,
    /// No tier produced anything.
    None,
}

/// A symbol lookup against one file.
#[derive(Debug, Clone)]
pub struct SymbolQuery {
    pub path: PathBuf,
    /// Case-insensitive substring filter on symbol names.
    pub name: Option<String>,
    /// Kind filter; empty means all kinds. Compared case-insensitively.
    pub kinds: Vec<String>,
}

/// A reference lookup for a symbol name under a search root.
#[derive(Debug, Clone)]
pub struct ReferenceQuery {
    pub symbol: String,
    pub search_path: PathBuf,
}

/// One reference site in tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceHit {
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub kind: RefKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// What the router hands back: the winning tier, measured latency, and
/// the results themselves.
#[derive(Debug, Clone, Serialize)]
pub struct QueryEnvelope<T> {
    pub source: QuerySource,
    pub latency_ms: u64,
    /// True when the index tier answered (a warm hit).
    pub cached: bool,
    /// True when the regex fallback answered.
    pub fallback: bool,
    pub results: Vec<T>,
}

impl<T> QueryEnvelope<T> {
    pub fn empty(latency_ms: u64) -> Self {
        Self {
            source: QuerySource::None,
            latency_ms,
            cached: false,
            fallback: false,
            results: Vec::new(),
        }
    }

    pub fn hit(source: QuerySource, latency_ms: u64, results: Vec<T>) -> Self {
        Self {
            cached: source == QuerySource::Index,
            fallback: source == QuerySource::Regex,
            source,
            latency_ms,
            results,
        }
    }
}
