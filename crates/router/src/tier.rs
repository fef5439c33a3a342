// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tier abstraction: one source consulted by a cascade.
//!
//! Keeping tiers behind a trait keeps adding or removing one (say a
//! future tree-sitter tier) a local change to the router's constructor.

use std::time::Duration;

use async_trait::async_trait;

use crate::query::{QueryOptions, QuerySource};

/// Errors a tier can surface. The router absorbs these and moves on.
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    #[error(transparent)]
    Store(#[from] mayla_store::StoreError),

    #[error(transparent)]
    Lsp(#[from] mayla_lsp::LspError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One source in a cascade: an identity, a budget, an opt-out, and the
/// lookup itself. An `Ok(vec![])` means "nothing here, keep going".
#[async_trait]
pub trait Tier<Q, T>: Send + Sync {
    fn source(&self) -> QuerySource;

    /// Per-tier time budget, clamped to the query's remaining deadline.
    fn budget(&self) -> Duration;

    fn enabled(&self, opts: &QueryOptions) -> bool;

    async fn lookup(&self, query: &Q, opts: &QueryOptions) -> Result<Vec<T>, TierError>;
}
