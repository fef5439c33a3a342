// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.
//!
//! Startup order matters: lock first (races lose here), then PID file,
//! then the stores and pipelines, and the socket bind last so a client
//! can never connect to a half-built daemon.

use std::fs::File;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use mayla_core::{InstanceError, InstanceId, InstancePaths};
use mayla_indexer::{
    Debouncer, DebouncerConfig, IgnoreRules, IndexerConfig, IndexerPool, JobQueues, QueueConfig,
    WorkspaceWatcher,
};
use mayla_lsp::{LspManager, ManagerConfig, ServerRegistry};
use mayla_router::Router;
use mayla_store::{IndexStore, StoreError};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::registry::{RegistryError, ToolRegistry};
use crate::tools::{IndexStatusTool, ReferencesTool, SymbolsTool};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Instance identity (ws-<hex>)
    pub instance_id: InstanceId,
    /// On-disk layout for this instance
    pub paths: InstancePaths,
    /// The workspace this daemon indexes and watches
    pub workspace_root: PathBuf,
    pub queue: QueueConfig,
    pub indexer: IndexerConfig,
    pub debounce: DebouncerConfig,
    pub lsp: ManagerConfig,
}

impl Config {
    /// Load configuration for an instance id.
    ///
    /// The workspace root comes from the instance's `workspace.path` hint
    /// if present; otherwise the daemon's working directory (the launcher
    /// starts us with cwd set to the workspace).
    pub fn load(instance_id: InstanceId) -> Result<Self, LifecycleError> {
        let home = crate::env::mayla_home()?;
        let paths = InstancePaths::new(&home, &instance_id);

        let workspace_root = match std::fs::read_to_string(&paths.workspace_hint_path) {
            Ok(contents) if !contents.trim().is_empty() => PathBuf::from(contents.trim()),
            _ => std::env::current_dir()?,
        };

        let mut queue = QueueConfig::default();
        if let Some(max_queue) = crate::env::max_queue() {
            queue.max_queue = max_queue;
        }

        let mut indexer = IndexerConfig::default();
        if let Some(workers) = crate::env::index_workers() {
            indexer.workers = workers;
        }
        if let Some(rate) = crate::env::rate_limit() {
            indexer.rate_limit = rate;
        }
        if let Some(size) = crate::env::max_file_size() {
            indexer.max_file_size = size;
        }

        let mut debounce = DebouncerConfig::default();
        if let Some(window) = crate::env::debounce_ms() {
            debounce.window = window;
        }

        let mut lsp = ManagerConfig::default();
        if let Some(max) = crate::env::lsp_max_concurrent() {
            lsp.max_concurrent = max;
        }
        if let Some(idle) = crate::env::lsp_idle_secs() {
            lsp.idle_timeout = idle;
        }

        Ok(Self {
            instance_id,
            paths,
            workspace_root,
            queue,
            indexer,
            debounce,
            lsp,
        })
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error(transparent)]
    InvalidInstance(#[from] InstanceError),

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("PID file error: {0}")]
    PidFile(String),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Index store error: {0}")]
    Store(#[from] StoreError),

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon state during operation.
///
/// The listener is returned separately so the socket server can own it.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub store: Arc<IndexStore>,
    pub pool: IndexerPool,
    pub debouncer: Debouncer,
    /// Watcher handle; dropping it stops the native watch threads
    pub watcher: Option<WorkspaceWatcher>,
    pub lsp: Arc<LspManager>,
    pub registry: Arc<ToolRegistry>,
    pub queues: JobQueues,
    pub ignore: IgnoreRules,
}

/// Result of daemon startup.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
}

/// Check whether a PID names a live process. On POSIX this is signal 0;
/// EPERM still means the process exists.
pub fn is_process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Read a PID file, refusing symlinks and non-positive values.
pub fn read_pid_file(path: &Path) -> Result<i32, LifecycleError> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Err(LifecycleError::PidFile(format!(
            "{} is a symlink, refusing to read it",
            path.display()
        )));
    }
    let contents = std::fs::read_to_string(path)?;
    let pid: i32 = contents
        .trim()
        .parse()
        .map_err(|_| LifecycleError::PidFile(format!("malformed PID file {}", path.display())))?;
    if pid <= 0 {
        return Err(LifecycleError::PidFile(format!(
            "non-positive PID {pid} in {}",
            path.display()
        )));
    }
    Ok(pid)
}

/// Write our PID with create-exclusive semantics and mode 0600. A stale
/// file naming a dead process is removed first.
pub fn write_pid_file(path: &Path) -> Result<(), LifecycleError> {
    if std::fs::symlink_metadata(path).is_ok() {
        match read_pid_file(path) {
            Ok(pid) if is_process_alive(pid) => {
                return Err(LifecycleError::PidFile(format!(
                    "PID file {} names live process {pid}",
                    path.display()
                )));
            }
            _ => {
                // Stale or malformed: remove and recreate
                std::fs::remove_file(path)?;
            }
        }
    }

    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(())
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock —
            // those files belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Create the instance and log directories
    std::fs::create_dir_all(&config.paths.dir)?;
    if let Some(parent) = config.paths.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire the lock FIRST - prevents races. Open without truncating
    // so a losing contender can't wipe the holder's file.
    let lock_file = {
        use std::os::unix::fs::OpenOptionsExt;
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(&config.paths.lock_path)?
    };
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // 3. PID file (stale files from a crashed daemon are replaced)
    write_pid_file(&config.paths.pid_path)?;

    // 4. Workspace hint so later launches resolve the same root
    if !config.paths.workspace_hint_path.exists() {
        std::fs::write(
            &config.paths.workspace_hint_path,
            config.workspace_root.to_string_lossy().as_bytes(),
        )?;
    }

    // 5. Open the index store
    let store = Arc::new(IndexStore::open(&config.paths.index_db_path)?);
    info!(
        db = %config.paths.index_db_path.display(),
        files = store.get_stats().map(|s| s.total_files()).unwrap_or(0),
        "index store open"
    );

    // 6. Language-server pool with its idle sweep
    let lsp = LspManager::new(ServerRegistry::defaults(), config.lsp.clone());
    lsp.spawn_idle_sweep();

    // 7. Indexing pipeline: queues → workers, watcher → debouncer → queues
    let ignore = IgnoreRules::defaults();
    let queues = JobQueues::new(config.queue);
    let pool = IndexerPool::new(
        queues.clone(),
        Arc::clone(&store),
        ignore.clone(),
        config.indexer.clone(),
    );
    pool.start();

    let debouncer = Debouncer::start(queues.clone(), config.debounce);
    let watcher = match WorkspaceWatcher::start(
        &config.workspace_root,
        ignore.clone(),
        debouncer.sender(),
    ) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            // A dead watcher degrades freshness but the daemon still works
            warn!(error = %e, "failed to start filesystem watcher");
            None
        }
    };

    // 8. Router and tool registry
    let router = Arc::new(Router::new(
        Arc::clone(&store),
        Arc::clone(&lsp),
        ignore.clone(),
    ));
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SymbolsTool::new(
        Arc::clone(&router),
        config.workspace_root.clone(),
    )))?;
    registry.register(Arc::new(ReferencesTool::new(
        Arc::clone(&router),
        config.workspace_root.clone(),
    )))?;
    registry.register(Arc::new(IndexStatusTool::new(
        Arc::clone(&store),
        pool.counters(),
        queues.clone(),
        Arc::clone(&lsp),
    )))?;
    let registry = Arc::new(registry);

    // 9. Remove stale socket and bind (LAST - only after everything else
    // is in place), then restrict to owner-only
    if config.paths.socket_path.exists() {
        std::fs::remove_file(&config.paths.socket_path)?;
    }
    let listener = UnixListener::bind(&config.paths.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.paths.socket_path.clone(), e))?;
    std::fs::set_permissions(
        &config.paths.socket_path,
        std::fs::Permissions::from_mode(0o700),
    )?;

    info!(instance = %config.instance_id, "daemon started");

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            store,
            pool,
            debouncer,
            watcher,
            lsp,
            registry,
            queues,
            ignore,
        },
        listener,
    })
}

impl DaemonState {
    /// Shut the pipelines down in dependency order, then remove the
    /// on-disk artifacts. Idempotent: missing files are fine.
    pub async fn shutdown(&mut self) {
        info!("Shutting down daemon...");

        // 1. Stop producing events
        self.watcher = None;

        // 2. Flush and stop the debouncer, then the workers
        self.debouncer.stop().await;
        self.pool.stop().await;

        // 3. Stop every language server (shutdown/exit/kill ladder)
        self.lsp.shutdown_all().await;

        if let Ok(stats) = self.store.get_stats() {
            info!(
                indexed = stats.indexed,
                symbols = stats.total_symbols,
                "final index stats"
            );
        }

        // 4. Remove socket and PID file; the lock releases on drop
        for path in [&self.config.paths.socket_path, &self.config.paths.pid_path] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "failed to remove file");
                }
            }
        }
        if self.config.paths.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.paths.lock_path) {
                warn!(error = %e, "failed to remove lock file");
            }
        }

        info!("Daemon shutdown complete");
    }
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    for path in [
        &config.paths.socket_path,
        &config.paths.pid_path,
        &config.paths.lock_path,
    ] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
