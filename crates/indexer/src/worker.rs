// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The indexer worker pool.
//!
//! Workers drain the priority queues and run the read → detect-encoding →
//! hash → extract → upsert pipeline against the store. A shared ticker
//! rate-limits the pool as a whole; content-hash dedup makes re-runs of an
//! unchanged file a no-op.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mayla_core::{FileStatus, IndexJob, Language};
use mayla_store::{FileUpsert, IndexStore, StoreError};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::ignore::IgnoreRules;
use crate::queue::JobQueues;
use crate::{decode_bytes, extract_symbols};

/// Sleep between polls when all queues are empty.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Emit a progress log every this many indexed files.
const PROGRESS_EVERY: u64 = 100;

/// Worker pool tunables.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Number of worker tasks.
    pub workers: usize,
    /// Files per second across the pool; 0 disables the limiter.
    pub rate_limit: u32,
    /// Files larger than this are recorded as skipped.
    pub max_file_size: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            rate_limit: 100,
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// Counters bumped by workers, readable by the status surface.
#[derive(Debug, Default)]
pub struct IndexerCounters {
    pub indexed: AtomicU64,
    pub failed: AtomicU64,
    pub skipped: AtomicU64,
}

impl IndexerCounters {
    pub fn indexed(&self) -> u64 {
        self.indexed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// Outcome of processing one job (test observability; counters are the
/// production surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Indexed,
    Unchanged,
    Skipped,
    Failed,
    Removed,
    Directory,
}

/// SHA-256 hex digest of normalized file content.
///
/// The router's freshness check and the workers must agree on this
/// function, byte for byte.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// The indexer worker pool.
pub struct IndexerPool {
    queues: JobQueues,
    store: Arc<IndexStore>,
    ignore: IgnoreRules,
    config: IndexerConfig,
    counters: Arc<IndexerCounters>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl IndexerPool {
    pub fn new(
        queues: JobQueues,
        store: Arc<IndexStore>,
        ignore: IgnoreRules,
        config: IndexerConfig,
    ) -> Self {
        Self {
            queues,
            store,
            ignore,
            config,
            counters: Arc::new(IndexerCounters::default()),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn counters(&self) -> Arc<IndexerCounters> {
        Arc::clone(&self.counters)
    }

    pub fn queues(&self) -> JobQueues {
        self.queues.clone()
    }

    /// Spawn the worker tasks.
    pub fn start(&self) {
        let limiter = (self.config.rate_limit > 0).then(|| {
            let period = Duration::from_secs(1) / self.config.rate_limit;
            Arc::new(AsyncMutex::new(tokio::time::interval(period)))
        });

        for worker_id in 0..self.config.workers.max(1) {
            let queues = self.queues.clone();
            let store = Arc::clone(&self.store);
            let ignore = self.ignore.clone();
            let config = self.config.clone();
            let counters = Arc::clone(&self.counters);
            let cancel = self.cancel.clone();
            let limiter = limiter.clone();
            self.tracker.spawn(async move {
                worker_loop(worker_id, queues, store, ignore, config, counters, cancel, limiter)
                    .await;
            });
        }
        self.tracker.close();
    }

    /// Cancel workers and join them.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    queues: JobQueues,
    store: Arc<IndexStore>,
    ignore: IgnoreRules,
    config: IndexerConfig,
    counters: Arc<IndexerCounters>,
    cancel: CancellationToken,
    limiter: Option<Arc<AsyncMutex<tokio::time::Interval>>>,
) {
    debug!(worker_id, "indexer worker started");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        // Shared rate limiter: one permit per tick across the pool
        if let Some(limiter) = &limiter {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = async {
                    limiter.lock().await.tick().await;
                } => {}
            }
        }

        let Some(job) = queues.try_dequeue() else {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(IDLE_POLL) => {}
            }
            continue;
        };

        let outcome = process_job(&store, &ignore, &config, &job);
        match outcome {
            JobOutcome::Indexed => {
                let done = counters.indexed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_EVERY == 0 {
                    info!(
                        indexed = done,
                        queue_depth = queues.depth(),
                        "indexing progress"
                    );
                }
            }
            JobOutcome::Failed | JobOutcome::Removed => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
            JobOutcome::Skipped => {
                counters.skipped.fetch_add(1, Ordering::Relaxed);
            }
            JobOutcome::Unchanged | JobOutcome::Directory => {}
        }
    }
    debug!(worker_id, "indexer worker stopped");
}

/// Run the indexing pipeline for one job. Synchronous: every step is
/// filesystem or store I/O.
pub(crate) fn process_job(
    store: &IndexStore,
    ignore: &IgnoreRules,
    config: &IndexerConfig,
    job: &IndexJob,
) -> JobOutcome {
    let path = job.path.as_path();
    let path_str = path.to_string_lossy().into_owned();

    if ignore.is_ignored(path) {
        record_status(store, &path_str, FileStatus::Skipped, Some("ignored"));
        return JobOutcome::Skipped;
    }

    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(_) => {
            // Stat-miss: the file is gone; drop any stale record
            match store.delete_file(&path_str) {
                Ok(true) => return JobOutcome::Removed,
                Ok(false) => {}
                Err(e) => warn!(path = %path_str, error = %e, "failed to prune file record"),
            }
            record_status(store, &path_str, FileStatus::Failed, Some("file not found"));
            return JobOutcome::Failed;
        }
    };

    if meta.is_dir() {
        return JobOutcome::Directory;
    }

    if meta.len() > config.max_file_size {
        record_status(store, &path_str, FileStatus::Skipped, Some("file too large"));
        return JobOutcome::Skipped;
    }

    let existing = match store.get_file(&path_str) {
        Ok(existing) => existing,
        Err(e) => {
            warn!(path = %path_str, error = %e, "store lookup failed");
            None
        }
    };

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            record_status(store, &path_str, FileStatus::Failed, Some(&e.to_string()));
            return JobOutcome::Failed;
        }
    };

    let (content, encoding) = decode_bytes(&bytes);
    let hash = content_hash(&content);

    if let Some(existing) = &existing {
        if existing.status == FileStatus::Indexed && existing.content_hash == hash {
            debug!(path = %path_str, "content unchanged, skipping");
            return JobOutcome::Unchanged;
        }
    }

    let language = Language::from_path(path);
    let symbols = language
        .map(|lang| extract_symbols(&content, lang))
        .unwrap_or_default();

    let upsert = FileUpsert {
        path: path_str.clone(),
        content_hash: hash,
        encoding: encoding.to_string(),
        language,
        status: FileStatus::Indexed,
        error: None,
    };
    let file_id = match store.upsert_file(&upsert) {
        Ok(id) => id,
        Err(e) => {
            warn!(path = %path_str, error = %e, "upsert failed");
            return JobOutcome::Failed;
        }
    };
    if let Err(e) = store.insert_symbols(file_id, &symbols) {
        warn!(path = %path_str, error = %e, "symbol insert failed");
        record_status(store, &path_str, FileStatus::Failed, Some(&e.to_string()));
        return JobOutcome::Failed;
    }

    JobOutcome::Indexed
}

/// Record a terminal status for a path, creating a record if none exists.
fn record_status(store: &IndexStore, path: &str, status: FileStatus, error: Option<&str>) {
    let result: Result<(), StoreError> = (|| {
        if store.get_file(path)?.is_some() {
            store.update_file_status(path, status, error)
        } else {
            store
                .upsert_file(&FileUpsert {
                    path: path.to_string(),
                    content_hash: String::new(),
                    encoding: String::new(),
                    language: None,
                    status,
                    error: error.map(str::to_string),
                })
                .map(|_| ())
        }
    })();
    if let Err(e) = result {
        warn!(path, error = %e, "failed to record file status");
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
