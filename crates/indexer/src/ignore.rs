// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ignore rules for the watch/index pipeline.
//!
//! Doublestar globs matched against the full "/"-delimited path, plus an
//! optional rule skipping any path whose final segment starts with a dot.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

/// Patterns excluded by default in every workspace.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "**/.git/**",
    "**/node_modules/**",
    "**/target/**",
    "**/vendor/**",
    "**/dist/**",
    "**/build/**",
    "**/__pycache__/**",
    "**/*.min.js",
    "**/.mayla/**",
];

/// Compiled ignore rules.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    set: GlobSet,
    skip_hidden: bool,
}

impl IgnoreRules {
    /// Build rules from the default patterns plus any extras.
    pub fn new(extra_patterns: &[String], skip_hidden: bool) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_PATTERNS
            .iter()
            .map(|p| (*p).to_string())
            .chain(extra_patterns.iter().cloned())
        {
            // Invalid user patterns are dropped rather than failing startup
            if let Ok(glob) = Glob::new(&pattern) {
                builder.add(glob);
            } else {
                tracing::warn!(pattern, "ignoring invalid glob pattern");
            }
        }
        let set = builder.build().unwrap_or_else(|_| GlobSet::empty());
        Self { set, skip_hidden }
    }

    /// Default rules: built-in patterns, hidden files skipped.
    pub fn defaults() -> Self {
        Self::new(&[], true)
    }

    /// Whether a path is excluded from watching and indexing.
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.skip_hidden {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if hidden {
                return true;
            }
        }
        self.set.is_match(path)
    }
}

#[cfg(test)]
#[path = "ignore_tests.rs"]
mod tests;
