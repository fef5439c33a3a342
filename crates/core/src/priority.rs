// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Index jobs and their queue priorities.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Queue priority for an index job. Workers drain High before Normal
/// before Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }

    /// Priority assigned to a debounce flush of `batch_size` events.
    pub fn for_batch(batch_size: usize) -> Self {
        if batch_size > 10 {
            Self::High
        } else if batch_size >= 3 {
            Self::Normal
        } else {
            Self::Low
        }
    }
}

/// A unit of indexing work. Transient; lives only in the worker queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexJob {
    pub path: PathBuf,
    pub priority: Priority,
}

impl IndexJob {
    pub fn new(path: impl Into<PathBuf>, priority: Priority) -> Self {
        Self {
            path: path.into(),
            priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        single = { 1, Priority::Low },
        pair = { 2, Priority::Low },
        small_batch = { 3, Priority::Normal },
        mid_batch = { 10, Priority::Normal },
        burst = { 11, Priority::High },
        large_burst = { 500, Priority::High },
    )]
    fn batch_size_maps_to_priority(size: usize, expected: Priority) {
        assert_eq!(Priority::for_batch(size), expected);
    }
}
