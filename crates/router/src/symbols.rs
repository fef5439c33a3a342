// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Symbol tiers: index, LSP, regex.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mayla_core::{FileStatus, Language, Symbol};
use mayla_indexer::{content_hash, decode_bytes, extract_symbols};
use mayla_lsp::LspManager;
use mayla_store::{FileUpsert, IndexStore};
use tracing::{debug, warn};

use crate::query::{QueryOptions, QuerySource, SymbolQuery};
use crate::tier::{Tier, TierError};

/// Index tier budget: a warm lookup plus a freshness stat.
const INDEX_BUDGET: Duration = Duration::from_millis(50);

/// LSP tier budget: server may need to parse the file.
const LSP_BUDGET: Duration = Duration::from_secs(2);

/// Regex tier budget: bounded read-and-scan.
const REGEX_BUDGET: Duration = Duration::from_secs(5);

/// Apply the query's name/kind filters and cap, preserving line order.
pub(crate) fn filter_symbols(
    mut symbols: Vec<Symbol>,
    query: &SymbolQuery,
    opts: &QueryOptions,
) -> Vec<Symbol> {
    if let Some(name) = &query.name {
        let needle = name.to_lowercase();
        symbols.retain(|s| s.name.to_lowercase().contains(&needle));
    }
    if !query.kinds.is_empty() {
        symbols.retain(|s| query.kinds.iter().any(|k| s.kind.matches_filter(k)));
    }
    symbols.sort_by_key(|s| (s.line_start, s.column_start.unwrap_or(0)));
    symbols.truncate(opts.max_results);
    symbols
}

/// Tier 1: the persistent index, accepted only when fresh.
pub struct IndexSymbolTier {
    store: Arc<IndexStore>,
}

impl IndexSymbolTier {
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tier<SymbolQuery, Symbol> for IndexSymbolTier {
    fn source(&self) -> QuerySource {
        QuerySource::Index
    }

    fn budget(&self) -> Duration {
        INDEX_BUDGET
    }

    fn enabled(&self, opts: &QueryOptions) -> bool {
        !opts.skip_index
    }

    async fn lookup(
        &self,
        query: &SymbolQuery,
        opts: &QueryOptions,
    ) -> Result<Vec<Symbol>, TierError> {
        let path_str = query.path.to_string_lossy();
        let Some(record) = self.store.get_file(&path_str)? else {
            return Ok(Vec::new());
        };
        if record.status != FileStatus::Indexed {
            return Ok(Vec::new());
        }

        // Freshness gate: stored hash must match the bytes on disk
        let bytes = std::fs::read(&query.path)?;
        let (content, _) = decode_bytes(&bytes);
        if content_hash(&content) != record.content_hash {
            debug!(path = %path_str, "index entry is stale");
            return Ok(Vec::new());
        }

        let symbols = self
            .store
            .get_symbols_by_file(record.id)?
            .into_iter()
            .map(|r| r.symbol)
            .collect();
        Ok(filter_symbols(symbols, query, opts))
    }
}

/// Tier 2: ask a language server, optionally writing the answer back.
pub struct LspSymbolTier {
    manager: Arc<LspManager>,
    store: Arc<IndexStore>,
}

impl LspSymbolTier {
    pub fn new(manager: Arc<LspManager>, store: Arc<IndexStore>) -> Self {
        Self { manager, store }
    }

    /// Persist LSP symbols so the next query is a warm index hit.
    fn write_back(&self, query: &SymbolQuery, symbols: &[Symbol]) -> Result<(), TierError> {
        let bytes = std::fs::read(&query.path)?;
        let (content, encoding) = decode_bytes(&bytes);
        let file_id = self.store.upsert_file(&FileUpsert {
            path: query.path.to_string_lossy().into_owned(),
            content_hash: content_hash(&content),
            encoding: encoding.to_string(),
            language: Language::from_path(&query.path),
            status: FileStatus::Indexed,
            error: None,
        })?;
        self.store.insert_symbols(file_id, symbols)?;
        Ok(())
    }
}

#[async_trait]
impl Tier<SymbolQuery, Symbol> for LspSymbolTier {
    fn source(&self) -> QuerySource {
        QuerySource::Lsp
    }

    fn budget(&self) -> Duration {
        LSP_BUDGET
    }

    fn enabled(&self, opts: &QueryOptions) -> bool {
        !opts.skip_lsp
    }

    async fn lookup(
        &self,
        query: &SymbolQuery,
        opts: &QueryOptions,
    ) -> Result<Vec<Symbol>, TierError> {
        let Some(language) = Language::from_path(&query.path) else {
            return Ok(Vec::new());
        };
        if !self.manager.supports(language) {
            return Ok(Vec::new());
        }

        let process = self.manager.get_or_start(language, &query.path).await?;
        let symbols = process.document_symbols(&query.path).await?;

        if opts.update_index && !symbols.is_empty() {
            if let Err(e) = self.write_back(query, &symbols) {
                warn!(path = %query.path.display(), error = %e, "index write-back failed");
            }
        }

        Ok(filter_symbols(symbols, query, opts))
    }
}

/// Tier 3: regex scan of the file itself.
pub struct RegexSymbolTier;

#[async_trait]
impl Tier<SymbolQuery, Symbol> for RegexSymbolTier {
    fn source(&self) -> QuerySource {
        QuerySource::Regex
    }

    fn budget(&self) -> Duration {
        REGEX_BUDGET
    }

    fn enabled(&self, opts: &QueryOptions) -> bool {
        opts.allow_fallback
    }

    async fn lookup(
        &self,
        query: &SymbolQuery,
        opts: &QueryOptions,
    ) -> Result<Vec<Symbol>, TierError> {
        let Some(language) = Language::from_path(&query.path) else {
            return Ok(Vec::new());
        };
        let bytes = std::fs::read(&query.path)?;
        let (content, _) = decode_bytes(&bytes);
        let symbols = extract_symbols(&content, language);
        Ok(filter_symbols(symbols, query, opts))
    }
}
