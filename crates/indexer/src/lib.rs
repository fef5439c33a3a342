// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mayla-indexer: the file-watch → debounce → priority-indexing pipeline.
//!
//! Filesystem events flow from the watcher into the debouncer, which
//! coalesces bursts per path and enqueues index jobs at a priority chosen
//! from batch size. A small worker pool drains the queues in strict
//! priority order: read → detect encoding → hash → extract symbols →
//! upsert into the store. Queues are bounded and drop on overflow; the
//! next change re-enqueues the path, and content-hash dedup makes the
//! redundant work idempotent.

pub mod debounce;
pub mod encoding;
pub mod extract;
pub mod ignore;
pub mod queue;
pub mod watcher;
pub mod worker;

pub use debounce::{Debouncer, DebouncerConfig};
pub use encoding::{decode_bytes, detect_encoding};
pub use extract::{classify_reference, extract_symbols};
pub use ignore::IgnoreRules;
pub use queue::{JobQueues, QueueConfig};
pub use watcher::WorkspaceWatcher;
pub use worker::{content_hash, IndexerConfig, IndexerCounters, IndexerPool};
