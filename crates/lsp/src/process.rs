// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One language-server subprocess: spawn, handshake, requests, stop.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use mayla_core::{Language, Symbol};
use parking_lot::Mutex;
use tokio::process::{Child, Command};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::client::LspClient;
use crate::config::LspServerConfig;
use crate::error::LspError;

/// Grace period for the server to exit after `shutdown`/`exit`.
const EXIT_GRACE: Duration = Duration::from_secs(3);

/// Budget for the `shutdown` request during stop.
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(5);

/// Lifecycle state of a server subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Stopped,
    Starting,
    Initializing,
    Ready,
    Error,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

/// A live (or stopping) language-server subprocess. The client's lifetime
/// is nested inside the process: stopping the process tears the client
/// down with it.
#[derive(Debug)]
pub struct LspProcess {
    config: LspServerConfig,
    root: PathBuf,
    state: Mutex<ProcessState>,
    child: AsyncMutex<Option<Child>>,
    client: LspClient,
    started_at: Instant,
    last_access: Mutex<Instant>,
    request_count: AtomicU64,
    error_count: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl LspProcess {
    /// Spawn the server and run the initialize handshake against `root`.
    pub async fn start(config: LspServerConfig, root: PathBuf) -> Result<Self, LspError> {
        let language = config.language;
        let command = which::which(&config.command).map_err(|_| LspError::NotInstalled {
            language,
            command: config.command.clone(),
        })?;

        debug!(language = %language, command = %command.display(), root = %root.display(), "starting language server");

        let mut child = Command::new(&command)
            .args(&config.args)
            .current_dir(&root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LspError::StartFailed {
                language,
                message: format!("spawn failed: {e}"),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| LspError::StartFailed {
            language,
            message: "no stdin pipe".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| LspError::StartFailed {
            language,
            message: "no stdout pipe".to_string(),
        })?;

        let client = LspClient::new(stdin, stdout);
        let process = Self {
            root,
            state: Mutex::new(ProcessState::Initializing),
            child: AsyncMutex::new(Some(child)),
            client,
            started_at: Instant::now(),
            last_access: Mutex::new(Instant::now()),
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            last_error: Mutex::new(None),
            config,
        };

        match process
            .client
            .initialize(&process.root, process.config.start_timeout)
            .await
        {
            Ok(_) => {
                *process.state.lock() = ProcessState::Ready;
                info!(language = %language, root = %process.root.display(), "language server ready");
                Ok(process)
            }
            Err(e) => {
                *process.state.lock() = ProcessState::Error;
                *process.last_error.lock() = Some(e.to_string());
                process.terminate().await;
                Err(LspError::StartFailed {
                    language,
                    message: format!("initialize failed: {e}"),
                })
            }
        }
    }

    pub fn language(&self) -> Language {
        self.config.language
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ProcessState::Ready && self.client.is_alive()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Mark the process as used now; resets the idle clock.
    pub fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    /// How long since the last request.
    pub fn idle_for(&self) -> Duration {
        self.last_access.lock().elapsed()
    }

    /// When the process was last used (for oldest-accessed eviction).
    pub fn last_access(&self) -> Instant {
        *self.last_access.lock()
    }

    /// Request document symbols for a file under the per-request budget.
    pub async fn document_symbols(&self, file: &Path) -> Result<Vec<Symbol>, LspError> {
        self.touch();
        self.request_count.fetch_add(1, Ordering::Relaxed);
        match self
            .client
            .document_symbols(file, self.config.request_timeout)
            .await
        {
            Ok(symbols) => Ok(symbols),
            Err(e) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                *self.last_error.lock() = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Graceful stop: `shutdown` request, `exit` notification, then
    /// terminate if the process has not exited within the grace period.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state == ProcessState::Stopped {
                return;
            }
            *state = ProcessState::Stopped;
        }

        if let Err(e) = self.client.shutdown_request(SHUTDOWN_BUDGET).await {
            debug!(language = %self.language(), error = %e, "shutdown request failed");
        }
        if let Err(e) = self.client.exit_notification().await {
            debug!(language = %self.language(), error = %e, "exit notification failed");
        }
        self.terminate().await;
        info!(language = %self.language(), "language server stopped");
    }

    /// Wait for exit with a grace period, then kill and reap.
    async fn terminate(&self) {
        let mut guard = self.child.lock().await;
        let Some(child) = guard.as_mut() else {
            return;
        };
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(language = %self.language(), %status, "server exited"),
            Ok(Err(e)) => warn!(language = %self.language(), error = %e, "wait failed"),
            Err(_) => {
                warn!(language = %self.language(), "server did not exit in time, killing");
                if let Err(e) = child.kill().await {
                    warn!(language = %self.language(), error = %e, "kill failed");
                }
            }
        }
        *guard = None;
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
