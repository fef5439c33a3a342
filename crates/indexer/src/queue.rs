// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded priority queues for index jobs.
//!
//! Three channels, drained in strict priority order. Enqueue never blocks:
//! a full queue drops the job and logs it. The watcher re-enqueues the
//! path on its next change, and content-hash dedup makes the repeat cheap,
//! so the system converges without per-path bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mayla_core::{IndexJob, Priority};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Queue bounds. High priority is a fixed small queue; Normal and Low
/// scale with `max_queue`.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub max_queue: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_queue: 1000 }
    }
}

impl QueueConfig {
    pub fn high_bound(&self) -> usize {
        100
    }

    pub fn normal_bound(&self) -> usize {
        self.max_queue
    }

    pub fn low_bound(&self) -> usize {
        self.max_queue * 2
    }
}

struct Lane {
    tx: mpsc::Sender<IndexJob>,
    rx: Mutex<mpsc::Receiver<IndexJob>>,
    bound: usize,
}

impl Lane {
    fn new(bound: usize) -> Self {
        let (tx, rx) = mpsc::channel(bound);
        Self {
            tx,
            rx: Mutex::new(rx),
            bound,
        }
    }

    fn depth(&self) -> usize {
        self.bound.saturating_sub(self.tx.capacity())
    }
}

struct Inner {
    high: Lane,
    normal: Lane,
    low: Lane,
    dropped: AtomicU64,
}

/// Shared handle to the three job lanes.
#[derive(Clone)]
pub struct JobQueues {
    inner: Arc<Inner>,
}

impl JobQueues {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                high: Lane::new(config.high_bound()),
                normal: Lane::new(config.normal_bound()),
                low: Lane::new(config.low_bound()),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    fn lane(&self, priority: Priority) -> &Lane {
        match priority {
            Priority::High => &self.inner.high,
            Priority::Normal => &self.inner.normal,
            Priority::Low => &self.inner.low,
        }
    }

    /// Enqueue without blocking. A full lane drops the job; returns
    /// whether the job was accepted.
    pub fn enqueue(&self, job: IndexJob) -> bool {
        let priority = job.priority;
        match self.lane(priority).tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    path = %job.path.display(),
                    priority = priority.as_str(),
                    "queue full, dropping index job"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Pop the next job in strict priority order, if any lane has one.
    pub fn try_dequeue(&self) -> Option<IndexJob> {
        for lane in [&self.inner.high, &self.inner.normal, &self.inner.low] {
            if let Ok(job) = lane.rx.lock().try_recv() {
                return Some(job);
            }
        }
        None
    }

    /// Total jobs currently queued across all lanes.
    pub fn depth(&self) -> usize {
        self.inner.high.depth() + self.inner.normal.depth() + self.inner.low.depth()
    }

    /// Jobs dropped because a lane was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
