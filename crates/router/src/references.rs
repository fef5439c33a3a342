// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference tiers: stored references from the index, then a word-boundary
//! regex walk over the search path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mayla_indexer::{classify_reference, decode_bytes, IgnoreRules};
use mayla_store::IndexStore;
use regex::Regex;
use tracing::debug;

use crate::query::{QueryOptions, QuerySource, ReferenceHit, ReferenceQuery};
use crate::tier::{Tier, TierError};

/// Index tier budget (FTS lookup plus reference rows).
const INDEX_BUDGET: Duration = Duration::from_millis(50);

/// Regex walk budget.
const REGEX_BUDGET: Duration = Duration::from_secs(5);

/// Longest snippet kept from a matched line.
const MAX_SNIPPET_LEN: usize = 160;

fn order_and_cap(mut hits: Vec<ReferenceHit>, opts: &QueryOptions) -> Vec<ReferenceHit> {
    hits.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
    hits.truncate(opts.max_results);
    hits
}

/// Tier 1: references already recorded in the store.
pub struct IndexReferenceTier {
    store: Arc<IndexStore>,
}

impl IndexReferenceTier {
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tier<ReferenceQuery, ReferenceHit> for IndexReferenceTier {
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
        query: &ReferenceQuery,
        opts: &QueryOptions,
    ) -> Result<Vec<ReferenceHit>, TierError> {
        let matches = self.store.search_symbols(&query.symbol, opts.max_results)?;
        let mut hits = Vec::new();
        for record in matches
            .iter()
            .filter(|r| r.symbol.name == query.symbol)
        {
            for reference in self.store.get_references_for_symbol(record.id)? {
                let file = self
                    .store
                    .get_file_by_id(reference.file_id)?
                    .map(|f| f.path)
                    .unwrap_or_default();
                hits.push(ReferenceHit {
                    file,
                    line: reference.reference.line,
                    column: reference.reference.column,
                    kind: reference.reference.kind,
                    snippet: reference.reference.snippet,
                });
            }
        }
        Ok(order_and_cap(hits, opts))
    }
}

/// Tier 2: walk the search path, word-boundary match, classify each hit
/// by lexical cues.
pub struct RegexReferenceTier {
    ignore: IgnoreRules,
}

impl RegexReferenceTier {
    pub fn new(ignore: IgnoreRules) -> Self {
        Self { ignore }
    }
}

#[async_trait]
impl Tier<ReferenceQuery, ReferenceHit> for RegexReferenceTier {
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
        query: &ReferenceQuery,
        opts: &QueryOptions,
    ) -> Result<Vec<ReferenceHit>, TierError> {
        let pattern = format!(r"\b{}\b", regex::escape(&query.symbol));
        let Ok(word) = Regex::new(&pattern) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        let walker = walkdir::WalkDir::new(&query.search_path)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.path() == query.search_path || !self.ignore.is_ignored(e.path())
            });

        'files: for entry in walker {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() {
                continue;
            }
            if mayla_core::Language::from_path(entry.path()).is_none() {
                continue;
            }
            let Ok(bytes) = std::fs::read(entry.path()) else {
                debug!(path = %entry.path().display(), "unreadable file in reference walk");
                continue;
            };
            let (content, _) = decode_bytes(&bytes);
            for (idx, line) in content.lines().enumerate() {
                for m in word.find_iter(line) {
                    hits.push(ReferenceHit {
                        file: entry.path().to_string_lossy().into_owned(),
                        line: (idx + 1) as u32,
                        column: Some((m.start() + 1) as u32),
                        kind: classify_reference(line, m.start()),
                        snippet: Some(line.trim().chars().take(MAX_SNIPPET_LEN).collect()),
                    });
                    if hits.len() >= opts.max_results {
                        break 'files;
                    }
                }
            }
        }

        Ok(order_and_cap(hits, opts))
    }
}
