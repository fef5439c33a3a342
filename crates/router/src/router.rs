// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cascade itself.

use std::sync::Arc;
use std::time::Instant;

use mayla_core::Symbol;
use mayla_indexer::IgnoreRules;
use mayla_lsp::LspManager;
use mayla_store::IndexStore;
use tracing::{debug, warn};

use crate::query::{
    QueryEnvelope, QueryOptions, ReferenceHit, ReferenceQuery, SymbolQuery,
};
use crate::references::{IndexReferenceTier, RegexReferenceTier};
use crate::symbols::{IndexSymbolTier, LspSymbolTier, RegexSymbolTier};
use crate::tier::Tier;

/// Routes symbol and reference queries across the tier lists.
pub struct Router {
    symbol_tiers: Vec<Box<dyn Tier<SymbolQuery, Symbol>>>,
    reference_tiers: Vec<Box<dyn Tier<ReferenceQuery, ReferenceHit>>>,
}

impl Router {
    pub fn new(store: Arc<IndexStore>, lsp: Arc<LspManager>, ignore: IgnoreRules) -> Self {
        Self {
            symbol_tiers: vec![
                Box::new(IndexSymbolTier::new(Arc::clone(&store))),
                Box::new(LspSymbolTier::new(lsp, Arc::clone(&store))),
                Box::new(RegexSymbolTier),
            ],
            reference_tiers: vec![
                Box::new(IndexReferenceTier::new(store)),
                Box::new(RegexReferenceTier::new(ignore)),
            ],
        }
    }

    /// Symbols for one file, first non-empty tier wins.
    pub async fn query_symbols(
        &self,
        query: &SymbolQuery,
        opts: &QueryOptions,
    ) -> QueryEnvelope<Symbol> {
        cascade(&self.symbol_tiers, query, opts).await
    }

    /// References to a symbol under a search root.
    pub async fn query_references(
        &self,
        query: &ReferenceQuery,
        opts: &QueryOptions,
    ) -> QueryEnvelope<ReferenceHit> {
        cascade(&self.reference_tiers, query, opts).await
    }
}

/// Walk the tier list under the total deadline. A tier that errors or
/// times out is absorbed; a tier that returns items short-circuits.
async fn cascade<Q: Sync, T>(
    tiers: &[Box<dyn Tier<Q, T>>],
    query: &Q,
    opts: &QueryOptions,
) -> QueryEnvelope<T> {
    let started = Instant::now();

    for tier in tiers {
        if !tier.enabled(opts) {
            continue;
        }
        let Some(remaining) = opts.deadline.checked_sub(started.elapsed()) else {
            debug!("query deadline exhausted before {:?} tier", tier.source());
            break;
        };
        let budget = tier.budget().min(remaining);

        match tokio::time::timeout(budget, tier.lookup(query, opts)).await {
            Ok(Ok(results)) if !results.is_empty() => {
                return QueryEnvelope::hit(
                    tier.source(),
                    started.elapsed().as_millis() as u64,
                    results,
                );
            }
            Ok(Ok(_)) => {
                debug!(source = ?tier.source(), "tier empty, continuing");
            }
            Ok(Err(e)) => {
                warn!(source = ?tier.source(), error = %e, "tier failed, continuing");
            }
            Err(_) => {
                warn!(source = ?tier.source(), ?budget, "tier timed out, continuing");
            }
        }
    }

    QueryEnvelope::empty(started.elapsed().as_millis() as u64)
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
