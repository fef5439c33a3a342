// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace instance identity and on-disk layout.
//!
//! Every workspace gets exactly one daemon instance, identified by
//! `ws-<16 hex>` where the hex digits are the truncated SHA-256 of the
//! absolute workspace path. The instance owns a directory under
//! `<home>/instances/<id>/` containing the socket, lock, PID file and
//! databases, plus a log file under `<home>/logs/`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of hex digits kept from the workspace path hash.
const ID_HEX_LEN: usize = 16;

/// Errors from instance-id parsing.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("invalid instance id {0:?}: expected ws-<16 hex digits>")]
    InvalidId(String),
}

/// Stable identifier for a workspace instance (`ws-<16 hex>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Derive the instance id for a workspace path.
    ///
    /// The path is used as given; callers canonicalize first so that the
    /// same workspace always maps to the same instance.
    pub fn for_workspace(workspace: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(workspace.to_string_lossy().as_bytes());
        let digest = hasher.finalize();
        let hex = hex::encode(&digest[..ID_HEX_LEN / 2]);
        Self(format!("ws-{hex}"))
    }

    /// Parse and validate an instance id received from the command line.
    pub fn parse(s: &str) -> Result<Self, InstanceError> {
        let hex = s
            .strip_prefix("ws-")
            .ok_or_else(|| InstanceError::InvalidId(s.to_string()))?;
        let valid = hex.len() == ID_HEX_LEN
            && hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase());
        if !valid {
            return Err(InstanceError::InvalidId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-disk layout of one daemon instance.
///
/// All paths are derived from the Mayla home directory (`~/.mayla` unless
/// overridden) and the instance id. Nothing here touches the filesystem;
/// creation and cleanup belong to the daemon lifecycle.
#[derive(Debug, Clone)]
pub struct InstancePaths {
    /// Instance directory: `<home>/instances/<id>`
    pub dir: PathBuf,
    /// Unix socket the daemon serves on
    pub socket_path: PathBuf,
    /// Exclusive advisory lock file
    pub lock_path: PathBuf,
    /// PID file (ASCII decimal, mode 0600)
    pub pid_path: PathBuf,
    /// Symbol index database
    pub index_db_path: PathBuf,
    /// Memory tool database (reserved for the memory store)
    pub memory_db_path: PathBuf,
    /// Optional hint file holding the absolute workspace path
    pub workspace_hint_path: PathBuf,
    /// Daemon log file: `<home>/logs/daemon-<id>.log`
    pub log_path: PathBuf,
}

impl InstancePaths {
    /// Compute the layout for an instance under the given Mayla home.
    pub fn new(home: &Path, id: &InstanceId) -> Self {
        let dir = home.join("instances").join(id.as_str());
        Self {
            socket_path: dir.join("daemon.sock"),
            lock_path: dir.join("daemon.lock"),
            pid_path: dir.join("daemon.pid"),
            index_db_path: dir.join("index.db"),
            memory_db_path: dir.join("memory.db"),
            workspace_hint_path: dir.join("workspace.path"),
            log_path: home.join("logs").join(format!("daemon-{id}.log")),
            dir,
        }
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
