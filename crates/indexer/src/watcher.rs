// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recursive filesystem watching.
//!
//! Raw notify events are mapped to [`FileEvent`]s and forwarded to the
//! debouncer. Deletes are surfaced as events but never turned into store
//! deletions here; the indexer prunes on stat-miss, which tolerates
//! rename-then-create sequences.

use std::path::Path;

use mayla_core::{FileEvent, FileEventKind, IndexJob, Priority};
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::ignore::IgnoreRules;
use crate::queue::JobQueues;

/// Watches a workspace root recursively, feeding the debouncer.
pub struct WorkspaceWatcher {
    // Held for its Drop: dropping stops the native watcher threads
    _watcher: RecommendedWatcher,
}

fn map_kind(kind: &EventKind) -> Option<FileEventKind> {
    match kind {
        EventKind::Create(_) => Some(FileEventKind::Create),
        EventKind::Modify(ModifyKind::Name(_)) => Some(FileEventKind::Rename),
        EventKind::Modify(_) => Some(FileEventKind::Modify),
        EventKind::Remove(_) => Some(FileEventKind::Delete),
        _ => None,
    }
}

impl WorkspaceWatcher {
    /// Subscribe to the root. New directories join the watch set as the
    /// platform reports their creation.
    pub fn start(
        root: &Path,
        ignore: IgnoreRules,
        events: mpsc::UnboundedSender<FileEvent>,
    ) -> Result<Self, notify::Error> {
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        let Some(kind) = map_kind(&event.kind) else {
                            return;
                        };
                        for path in event.paths {
                            if ignore.is_ignored(&path) {
                                continue;
                            }
                            if events.send(FileEvent::new(path, kind)).is_err() {
                                // Debouncer is gone; daemon is shutting down
                                return;
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "watch error"),
                }
            })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        debug!(root = %root.display(), "watching workspace");
        Ok(Self { _watcher: watcher })
    }
}

/// Walk the workspace once at startup, enqueueing every kept file at Low
/// priority. Returns the number of files enqueued.
pub fn initial_scan(root: &Path, ignore: &IgnoreRules, queues: &JobQueues) -> usize {
    let mut enqueued = 0;
    let walker = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.path() == root || !ignore.is_ignored(entry.path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "scan entry error");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if queues.enqueue(IndexJob::new(entry.path(), Priority::Low)) {
            enqueued += 1;
        }
    }
    enqueued
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
