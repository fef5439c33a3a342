// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve the Mayla home: MAYLA_HOME > ~/.mayla
pub fn mayla_home() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("MAYLA_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoHomeDir)?;
    Ok(PathBuf::from(home).join(".mayla"))
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Indexer worker count override
pub fn index_workers() -> Option<usize> {
    parse_var("MAYLA_INDEX_WORKERS")
}

/// Indexer rate limit override (files/sec, 0 disables)
pub fn rate_limit() -> Option<u32> {
    parse_var("MAYLA_RATE_LIMIT")
}

/// Maximum indexable file size override (bytes)
pub fn max_file_size() -> Option<u64> {
    parse_var("MAYLA_MAX_FILE_SIZE")
}

/// Normal-queue bound override
pub fn max_queue() -> Option<usize> {
    parse_var("MAYLA_MAX_QUEUE")
}

/// Debounce window override
pub fn debounce_ms() -> Option<Duration> {
    parse_var::<u64>("MAYLA_DEBOUNCE_MS").map(Duration::from_millis)
}

/// LSP pool size override
pub fn lsp_max_concurrent() -> Option<usize> {
    parse_var("MAYLA_LSP_MAX_CONCURRENT")
}

/// LSP idle eviction override
pub fn lsp_idle_secs() -> Option<Duration> {
    parse_var::<u64>("MAYLA_LSP_IDLE_SECS").map(Duration::from_secs)
}
