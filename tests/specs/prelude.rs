//! Test helpers for behavioral specifications.
//!
//! Provides a small DSL for launching daemon instances and speaking
//! JSON-RPC to them over the instance socket.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tempfile::TempDir;

/// How long to wait for READY on stdout.
pub const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request socket timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Generic polling budget for eventually-consistent assertions.
pub const POLL_BUDGET: Duration = Duration::from_secs(15);

/// Path to the built daemon binary.
pub fn daemon_binary() -> PathBuf {
    assert_cmd::cargo::cargo_bin("mayla-daemon")
}

/// One running daemon instance plus its throwaway home and workspace.
pub struct Daemon {
    pub child: Child,
    pub home: TempDir,
    pub workspace: TempDir,
    pub instance_id: String,
    stdout_lines: mpsc::Receiver<String>,
}

impl Daemon {
    /// Launch a daemon for a fresh workspace and wait for READY.
    pub fn start() -> Self {
        let mut daemon = Self::spawn(&[]);
        daemon.wait_ready();
        daemon
    }

    /// Launch with an extra trailing argument (e.g. a parent PID) and
    /// wait for READY.
    pub fn start_with_parent(parent_pid: u32) -> Self {
        let mut daemon = Self::spawn(&[parent_pid.to_string()]);
        daemon.wait_ready();
        daemon
    }

    /// Launch without waiting (for startup-failure tests).
    pub fn spawn(extra_args: &[String]) -> Self {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let instance_id =
            mayla_core::InstanceId::for_workspace(workspace.path()).to_string();

        let child = spawn_daemon(&home, &workspace, &instance_id, extra_args);
        Self::wrap(child, home, workspace, instance_id)
    }

    /// Launch a second daemon against an existing instance.
    pub fn spawn_contender(&self) -> Child {
        spawn_daemon(&self.home, &self.workspace, &self.instance_id, &[])
    }

    fn wrap(
        mut child: Child,
        home: TempDir,
        workspace: TempDir,
        instance_id: String,
    ) -> Self {
        let stdout = child.stdout.take().unwrap();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            child,
            home,
            workspace,
            instance_id,
            stdout_lines: rx,
        }
    }

    /// Block until the daemon prints READY.
    pub fn wait_ready(&mut self) {
        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .expect("daemon did not print READY in time");
            match self.stdout_lines.recv_timeout(remaining) {
                Ok(line) if line.trim() == "READY" => return,
                Ok(_) => continue,
                Err(_) => panic!("daemon exited or went silent before READY"),
            }
        }
    }

    pub fn instance_dir(&self) -> PathBuf {
        self.home
            .path()
            .join("instances")
            .join(&self.instance_id)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.instance_dir().join("daemon.sock")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.instance_dir().join("daemon.pid")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.instance_dir().join("daemon.lock")
    }

    /// Send one JSON-RPC request and read one response value.
    pub fn request(&self, payload: &Value) -> Value {
        let mut stream = UnixStream::connect(self.socket_path()).unwrap();
        stream.set_read_timeout(Some(REQUEST_TIMEOUT)).unwrap();
        stream
            .write_all(payload.to_string().as_bytes())
            .unwrap();
        stream.flush().unwrap();

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).expect("response line");
        serde_json::from_str(&line).expect("valid JSON response")
    }

    /// Send raw bytes and return the first response line, if any.
    pub fn request_raw(&self, payload: &[u8]) -> Option<String> {
        let mut stream = UnixStream::connect(self.socket_path()).unwrap();
        stream.set_read_timeout(Some(REQUEST_TIMEOUT)).unwrap();
        stream.write_all(payload).unwrap();
        stream.flush().unwrap();

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(_) => None,
        }
    }

    /// Call a tool and return the parsed response.
    pub fn call_tool(&self, name: &str, arguments: Value) -> Value {
        self.request(&serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments},
        }))
    }

    /// Send SIGTERM to the daemon.
    pub fn terminate(&self) {
        let status = Command::new("kill")
            .arg(self.child.id().to_string())
            .status()
            .unwrap();
        assert!(status.success(), "kill must succeed");
    }

    /// Poll for process exit within a budget.
    pub fn wait_exit(&mut self, budget: Duration) -> Option<ExitStatus> {
        let deadline = Instant::now() + budget;
        while Instant::now() < deadline {
            if let Ok(Some(status)) = self.child.try_wait() {
                return Some(status);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        None
    }

    /// Poll an assertion until it passes or the budget runs out.
    pub fn poll_until<F: FnMut() -> bool>(&self, mut check: F, what: &str) {
        let deadline = Instant::now() + POLL_BUDGET;
        while Instant::now() < deadline {
            if check() {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        panic!("timed out waiting for: {what}");
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_daemon(
    home: &TempDir,
    workspace: &TempDir,
    instance_id: &str,
    extra_args: &[String],
) -> Child {
    Command::new(daemon_binary())
        .arg(instance_id)
        .args(extra_args)
        .env("MAYLA_HOME", home.path())
        .env("RUST_LOG", "info")
        .current_dir(workspace.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .spawn()
        .expect("daemon binary spawns")
}

/// Drain a child's output into strings (for startup-failure tests).
pub fn collect_output(child: &mut Child) -> (String, String) {
    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_string(&mut stdout);
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr);
    }
    (stdout, stderr)
}
