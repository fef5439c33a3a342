// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in tools: symbol search, reference search, index status.
//!
//! Each tool is a thin adapter from JSON arguments onto the router or the
//! stats surfaces. Other catalog tools (file I/O, memory, docs) plug into
//! the same [`Tool`] interface.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mayla_indexer::{IndexerCounters, JobQueues};
use mayla_lsp::LspManager;
use mayla_router::{QueryOptions, ReferenceQuery, Router, SymbolQuery};
use mayla_store::IndexStore;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::registry::{Tool, ToolAnnotations, ToolError};

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArgs(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Failed(e.to_string()))
}

/// Resolve a possibly-relative tool path against the workspace root.
fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}

#[derive(Debug, Deserialize)]
struct SymbolsArgs {
    path: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    kinds: Vec<String>,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default)]
    skip_index: bool,
    #[serde(default)]
    skip_lsp: bool,
    #[serde(default)]
    allow_fallback: Option<bool>,
    #[serde(default)]
    update_index: Option<bool>,
}

impl SymbolsArgs {
    fn options(&self) -> QueryOptions {
        let defaults = QueryOptions::default();
        QueryOptions {
            max_results: self.max_results.unwrap_or(defaults.max_results),
            skip_index: self.skip_index,
            skip_lsp: self.skip_lsp,
            allow_fallback: self.allow_fallback.unwrap_or(defaults.allow_fallback),
            update_index: self.update_index.unwrap_or(defaults.update_index),
            ..defaults
        }
    }
}

/// `symbols`: list symbols in a file via the tier cascade.
pub struct SymbolsTool {
    router: Arc<Router>,
    workspace_root: PathBuf,
}

impl SymbolsTool {
    pub fn new(router: Arc<Router>, workspace_root: PathBuf) -> Self {
        Self {
            router,
            workspace_root,
        }
    }
}

#[async_trait]
impl Tool for SymbolsTool {
    fn name(&self) -> &str {
        "symbols"
    }

    fn description(&self) -> &str {
        "List symbols defined in a file, with optional name and kind filters. \
         Answers from the symbol index when fresh, a language server when \
         available, or a regex scan as a last resort."
    }

    fn title(&self) -> Option<&str> {
        Some("Find symbols")
    }

    fn annotations(&self) -> Option<ToolAnnotations> {
        Some(ToolAnnotations::read_only())
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, absolute or workspace-relative"
                },
                "name": {
                    "type": "string",
                    "description": "Case-insensitive substring filter on symbol names"
                },
                "kinds": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Symbol kinds to keep (function, struct, ...)"
                },
                "max_results": {"type": "integer", "minimum": 1},
                "skip_index": {"type": "boolean"},
                "skip_lsp": {"type": "boolean"},
                "allow_fallback": {"type": "boolean"},
                "update_index": {"type": "boolean"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: SymbolsArgs = parse_args(args)?;
        let options = args.options();
        let query = SymbolQuery {
            path: resolve_path(&self.workspace_root, &args.path),
            name: args.name,
            kinds: args.kinds,
        };
        let envelope = self.router.query_symbols(&query, &options).await;
        to_value(&envelope)
    }
}

#[derive(Debug, Deserialize)]
struct ReferencesArgs {
    symbol: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default)]
    skip_index: bool,
}

/// `references`: find reference sites for a symbol name.
pub struct ReferencesTool {
    router: Arc<Router>,
    workspace_root: PathBuf,
}

impl ReferencesTool {
    pub fn new(router: Arc<Router>, workspace_root: PathBuf) -> Self {
        Self {
            router,
            workspace_root,
        }
    }
}

#[async_trait]
impl Tool for ReferencesTool {
    fn name(&self) -> &str {
        "references"
    }

    fn description(&self) -> &str {
        "Find references to a symbol name under a search path, classified \
         as definition, usage, import, comment or string."
    }

    fn title(&self) -> Option<&str> {
        Some("Find references")
    }

    fn annotations(&self) -> Option<ToolAnnotations> {
        Some(ToolAnnotations::read_only())
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Exact symbol name to look up"
                },
                "path": {
                    "type": "string",
                    "description": "Search root, absolute or workspace-relative; defaults to the workspace"
                },
                "max_results": {"type": "integer", "minimum": 1},
                "skip_index": {"type": "boolean"}
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ReferencesArgs = parse_args(args)?;
        let defaults = QueryOptions::default();
        let options = QueryOptions {
            max_results: args.max_results.unwrap_or(defaults.max_results),
            skip_index: args.skip_index,
            ..defaults
        };
        let search_path = match &args.path {
            Some(path) => resolve_path(&self.workspace_root, path),
            None => self.workspace_root.clone(),
        };
        let query = ReferenceQuery {
            symbol: args.symbol,
            search_path,
        };
        let envelope = self.router.query_references(&query, &options).await;
        to_value(&envelope)
    }
}

/// `index_status`: introspect index health, queue depth and the LSP pool.
pub struct IndexStatusTool {
    store: Arc<IndexStore>,
    counters: Arc<IndexerCounters>,
    queues: JobQueues,
    lsp: Arc<LspManager>,
    started: Instant,
}

impl IndexStatusTool {
    pub fn new(
        store: Arc<IndexStore>,
        counters: Arc<IndexerCounters>,
        queues: JobQueues,
        lsp: Arc<LspManager>,
    ) -> Self {
        Self {
            store,
            counters,
            queues,
            lsp,
            started: Instant::now(),
        }
    }
}

#[async_trait]
impl Tool for IndexStatusTool {
    fn name(&self) -> &str {
        "index_status"
    }

    fn description(&self) -> &str {
        "Report symbol-index statistics, queue depth and language-server pool state."
    }

    fn title(&self) -> Option<&str> {
        Some("Index status")
    }

    fn annotations(&self) -> Option<ToolAnnotations> {
        Some(ToolAnnotations::read_only())
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let stats = self
            .store
            .get_stats()
            .map_err(|e| ToolError::Failed(e.to_string()))?;
        let servers: Vec<Value> = self
            .lsp
            .pool_status()
            .into_iter()
            .map(|entry| {
                json!({
                    "language": entry.language.as_str(),
                    "state": entry.state.as_str(),
                    "root": entry.root,
                    "requests": entry.requests,
                    "errors": entry.errors,
                })
            })
            .collect();

        Ok(json!({
            "uptime_secs": self.started.elapsed().as_secs(),
            "files": {
                "pending": stats.pending,
                "indexed": stats.indexed,
                "failed": stats.failed,
                "skipped": stats.skipped,
                "total": stats.total_files(),
            },
            "symbols": stats.total_symbols,
            "last_indexed_at": stats.last_indexed_at.map(|t| t.to_rfc3339()),
            "session": {
                "indexed": self.counters.indexed(),
                "failed": self.counters.failed(),
                "skipped": self.counters.skipped(),
            },
            "queue_depth": self.queues.depth(),
            "queue_dropped": self.queues.dropped(),
            "language_servers": servers,
        }))
    }
}

/// Wall-clock budget for a single `tools/call`.
pub const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(4 * 60);

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
