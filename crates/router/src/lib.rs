// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mayla-router: the semantic query router.
//!
//! Symbol and reference queries cascade through an ordered list of tiers
//! (persistent index, language server, regex scan), each under its own
//! budget inside a total deadline. The first non-empty tier wins; tier
//! failures are absorbed and the cascade continues. Index results are
//! accepted only when the on-disk content hash still matches the stored
//! one, and LSP results can be written back to keep the index warm.

pub mod query;
pub mod references;
pub mod router;
pub mod symbols;
pub mod tier;

pub use query::{
    QueryEnvelope, QueryOptions, QuerySource, ReferenceHit, ReferenceQuery, SymbolQuery,
};
pub use router::Router;
pub use tier::{Tier, TierError};
