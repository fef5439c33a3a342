// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project root detection.

use std::path::{Path, PathBuf};

/// Walk upward from the file's directory; the first ancestor containing
/// any root-pattern file is the project root. Falls back to the file's
/// own directory.
pub fn detect_project_root(file: &Path, root_patterns: &[String]) -> PathBuf {
    let start = if file.is_dir() {
        file
    } else {
        file.parent().unwrap_or(file)
    };

    for dir in start.ancestors() {
        for pattern in root_patterns {
            if dir.join(pattern).exists() {
                return dir.to_path_buf();
            }
        }
    }

    start.to_path_buf()
}
