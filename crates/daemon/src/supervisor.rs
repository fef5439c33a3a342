// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parent-process supervision.
//!
//! When launched with a parent PID, the daemon polls it and triggers a
//! graceful shutdown the moment it disappears, so an orphaned daemon
//! never outlives its client.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::lifecycle::is_process_alive;

/// How often the parent is checked.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Spawn the watch task. `parent_lost` is notified once when the parent
/// disappears.
pub fn spawn_parent_watch(parent_pid: i32, parent_lost: Arc<Notify>) {
    tokio::spawn(async move {
        debug!(parent_pid, "supervising parent process");
        let mut tick = tokio::time::interval(POLL_INTERVAL);
        loop {
            tick.tick().await;
            if !is_process_alive(parent_pid) {
                warn!(parent_pid, "parent process died, requesting shutdown");
                parent_lost.notify_one();
                break;
            }
        }
    });
}
