// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mayla Daemon (mayla-daemon)
//!
//! Per-workspace background process that owns the symbol index, the
//! language-server pool and the file-watch pipeline, and serves the tool
//! catalog over a Unix socket.
//!
//! Architecture:
//! - Socket server task: accepts connections, decodes JSON-RPC, fans
//!   requests into the bounded executor
//! - Indexing pipeline: watcher → debouncer → priority queues → workers
//! - Main task: signal handling, parent supervision, graceful shutdown

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;
mod lifecycle;
mod registry;
mod rpc;
mod server;
mod supervisor;
mod tools;

use std::sync::Arc;

use mayla_core::InstanceId;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};

use crate::lifecycle::{Config, LifecycleError, StartupResult};
use crate::server::{RpcServer, ServerCtx};

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    // Handle info flags before any config/lock acquisition
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--version" | "-V" | "-v") => {
            println!("mayla-daemon {}", env!("CARGO_PKG_VERSION"));
            return 0;
        }
        Some("--help" | "-h" | "help") => {
            print_help();
            return 0;
        }
        _ => {}
    }

    let Some(instance_arg) = args.first() else {
        eprintln!("error: missing <instance-id> argument");
        eprintln!("Usage: mayla-daemon <instance-id> [parent-pid]");
        return 1;
    };
    let instance_id = match InstanceId::parse(instance_arg) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };
    // parent-pid, if present and parseable, activates the supervisor
    let parent_pid: Option<i32> = args.get(1).and_then(|s| s.parse().ok()).filter(|p| *p > 0);

    let config = match Config::load(instance_id) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    // Rotate the log if it has grown too large, then write a startup
    // marker synchronously so a launching client can find this attempt
    rotate_log_if_needed(&config.paths.log_path);
    if let Err(e) = write_startup_marker(&config) {
        eprintln!("error: cannot write log file: {e}");
        return 1;
    }

    let _log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: logging setup failed: {e}");
            return 1;
        }
    };

    info!(instance = %config.instance_id, workspace = %config.workspace_root.display(), "starting daemon");

    let StartupResult {
        mut daemon,
        listener,
    } = match lifecycle::startup(&config).await {
        Ok(result) => result,
        Err(LifecycleError::LockFailed(_)) => {
            // Another daemon holds this instance; report and bow out
            let pid = std::fs::read_to_string(&config.paths.pid_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("mayla-daemon is already running for {}", config.instance_id);
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            return 1;
        }
        Err(e) => {
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            return 1;
        }
    };

    // Socket server task
    let ctx = ServerCtx::new(Arc::clone(&daemon.registry));
    let rpc_server = RpcServer::new(listener, ctx);
    tokio::spawn(Arc::clone(&rpc_server).run());

    // Supervisor, if a parent PID was given
    let parent_lost = Arc::new(Notify::new());
    if let Some(pid) = parent_pid {
        supervisor::spawn_parent_watch(pid, Arc::clone(&parent_lost));
    }

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("signal handler setup failed: {e}");
            return 1;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!("signal handler setup failed: {e}");
            return 1;
        }
    };

    info!(
        socket = %config.paths.socket_path.display(),
        "Daemon ready, listening"
    );

    // Signal ready for the launching client
    println!("READY");

    // Seed the index in the background - the daemon is already serving
    {
        let queues = daemon.queues.clone();
        let ignore = daemon.ignore.clone();
        let root = config.workspace_root.clone();
        tokio::task::spawn_blocking(move || {
            let enqueued = mayla_indexer::watcher::initial_scan(&root, &ignore, &queues);
            info!(enqueued, "initial workspace scan complete");
        });
    }

    // Wait for a shutdown trigger
    let exit_code = tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
            0
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
            0
        }
        _ = parent_lost.notified() => {
            info!("Parent process gone, shutting down...");
            1
        }
    };

    // Graceful shutdown: drain connections first, then the pipelines
    rpc_server.shutdown().await;
    daemon.shutdown().await;
    info!("Daemon stopped");
    exit_code
}

fn print_help() {
    println!("mayla-daemon {}", env!("CARGO_PKG_VERSION"));
    println!("Mayla Daemon - per-workspace code-intelligence daemon");
    println!();
    println!("USAGE:");
    println!("    mayla-daemon <instance-id> [parent-pid]");
    println!();
    println!("The daemon is typically started by a client adapter and should");
    println!("not be invoked directly. It listens on a Unix socket inside the");
    println!("instance directory for JSON-RPC requests.");
    println!();
    println!("ARGS:");
    println!("    <instance-id>    Workspace instance id (ws-<16 hex digits>)");
    println!("    [parent-pid]     Client PID to supervise; daemon exits when it dies");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon-<id>.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Best-effort: rotation failures are silently ignored so the daemon
/// still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Startup marker prefix written to the log before anything else.
/// Full format: "--- mayla-daemon: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- mayla-daemon: starting (pid: ";

/// Write the startup marker to the log file (appends to existing log).
fn write_startup_marker(config: &Config) -> std::io::Result<()> {
    use std::io::Write;

    if let Some(parent) = config.paths.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.paths.log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write a startup error synchronously to the log file so it is visible
/// even if the process exits before the async logger flushes.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.paths.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

/// Logs go to both stderr and the instance log file (non-blocking).
fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = config
        .paths
        .log_path
        .parent()
        .ok_or(LifecycleError::NoHomeDir)?;
    std::fs::create_dir_all(log_dir)?;
    let file_name = config
        .paths
        .log_path
        .file_name()
        .ok_or(LifecycleError::NoHomeDir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
