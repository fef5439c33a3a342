// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event debouncing.
//!
//! Coalesces bursts of per-path events into one delayed flush: a map from
//! path to latest event, flushed `window` after the most recent event, or
//! immediately once `max_batch` distinct paths accumulate. Flush priority
//! scales with batch size.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use mayla_core::{FileEvent, IndexJob, Priority};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::queue::JobQueues;

/// Debounce tunables.
#[derive(Debug, Clone, Copy)]
pub struct DebouncerConfig {
    /// Quiet period after the most recent event before a flush.
    pub window: Duration,
    /// Flush immediately once this many distinct paths are pending.
    pub max_batch: usize,
}

impl Default for DebouncerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(300),
            max_batch: 100,
        }
    }
}

/// The debouncer task handle.
pub struct Debouncer {
    tx: mpsc::UnboundedSender<FileEvent>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Debouncer {
    /// Spawn the debounce task feeding `queues`.
    pub fn start(queues: JobQueues, config: DebouncerConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        tracker.spawn(run(rx, queues, config, cancel.clone()));
        tracker.close();
        Self {
            tx,
            cancel,
            tracker,
        }
    }

    /// Sender the watcher pushes raw events into.
    pub fn sender(&self) -> mpsc::UnboundedSender<FileEvent> {
        self.tx.clone()
    }

    /// Flush pending events and join the task.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.tracker.wait().await;
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<FileEvent>,
    queues: JobQueues,
    config: DebouncerConfig,
    cancel: CancellationToken,
) {
    let mut pending: HashMap<PathBuf, FileEvent> = HashMap::new();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                flush(&mut pending, &queues);
                break;
            }

            event = rx.recv() => {
                match event {
                    Some(event) => {
                        pending.insert(event.path.clone(), event);
                        // Timer restarts on the most recent event
                        deadline = Some(Instant::now() + config.window);
                        if pending.len() >= config.max_batch {
                            flush(&mut pending, &queues);
                            deadline = None;
                        }
                    }
                    None => {
                        flush(&mut pending, &queues);
                        break;
                    }
                }
            }

            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                if deadline.is_some() =>
            {
                flush(&mut pending, &queues);
                deadline = None;
            }
        }
    }
}

/// Drain the pending map into the queues at a batch-size priority.
fn flush(pending: &mut HashMap<PathBuf, FileEvent>, queues: &JobQueues) {
    if pending.is_empty() {
        return;
    }
    let priority = Priority::for_batch(pending.len());
    debug!(batch = pending.len(), priority = priority.as_str(), "debounce flush");
    for (path, _event) in pending.drain() {
        queues.enqueue(IndexJob::new(path, priority));
    }
}

#[cfg(test)]
#[path = "debounce_tests.rs"]
mod tests;
