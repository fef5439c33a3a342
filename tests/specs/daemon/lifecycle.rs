//! Instance lifecycle: locking, PID honesty, clean shutdown, supervision.

use std::process::{Command, Stdio};
use std::time::Duration;

use crate::prelude::*;

#[test]
fn version_flag_prints_and_exits_zero() {
    let output = Command::new(daemon_binary())
        .arg("--version")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("mayla-daemon "), "got: {stdout}");
}

#[test]
fn missing_instance_id_is_fatal() {
    let output = Command::new(daemon_binary()).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("instance-id"), "got: {stderr}");
}

#[test]
fn malformed_instance_id_is_fatal() {
    let output = Command::new(daemon_binary())
        .arg("not-an-instance")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn pid_file_names_the_running_daemon() {
    let daemon = Daemon::start();
    let pid: i32 = std::fs::read_to_string(daemon.pid_path())
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(pid as u32, daemon.child.id());
}

#[test]
fn second_daemon_loses_the_lock_race() {
    let daemon = Daemon::start();
    let first_pid = daemon.child.id();

    // Contender for the same instance must exit non-zero quickly
    let mut contender = daemon.spawn_contender();
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Ok(Some(status)) = contender.try_wait() {
            break status;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "contender did not exit"
        );
        std::thread::sleep(Duration::from_millis(20));
    };
    assert!(!status.success(), "second daemon must fail");

    // First daemon is unaffected: still serving, still named in the PID file
    let pong = daemon.request(&serde_json::json!({
        "jsonrpc": "2.0", "id": 1, "method": "ping"
    }));
    assert_eq!(pong["result"], serde_json::json!({}));
    let pid: u32 = std::fs::read_to_string(daemon.pid_path())
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(pid, first_pid);
}

#[test]
fn sigterm_shuts_down_cleanly_and_removes_artifacts() {
    let mut daemon = Daemon::start();
    assert!(daemon.pid_path().exists());
    assert!(daemon.socket_path().exists());

    daemon.terminate();
    let status = daemon
        .wait_exit(Duration::from_secs(35))
        .expect("daemon exits after SIGTERM");
    assert!(status.success(), "clean shutdown exits 0");

    assert!(!daemon.pid_path().exists(), "PID file removed");
    assert!(!daemon.socket_path().exists(), "socket removed");
    assert!(!daemon.lock_path().exists(), "lock file removed");
}

#[test]
fn stale_artifacts_from_a_killed_daemon_are_recovered() {
    let mut first = Daemon::start();
    // SIGKILL: no cleanup happens
    let _ = Command::new("kill")
        .args(["-9", &first.child.id().to_string()])
        .status()
        .unwrap();
    first.wait_exit(Duration::from_secs(10)).unwrap();
    assert!(first.pid_path().exists(), "stale PID file left behind");

    // A new daemon for the same instance takes over the stale files
    let mut second = spawn_for(&first);
    wait_ready_raw(&mut second);
    let pid: u32 = std::fs::read_to_string(first.pid_path())
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(pid, second.id(), "PID file now names the new daemon");

    let _ = second.kill();
    let _ = second.wait();
}

#[test]
fn parent_death_triggers_shutdown_with_nonzero_exit() {
    // A short-lived stand-in parent, reaped so its PID truly vanishes
    let mut parent = Command::new("sleep")
        .arg("2")
        .stdout(Stdio::null())
        .spawn()
        .unwrap();
    let parent_pid = parent.id();
    std::thread::spawn(move || {
        let _ = parent.wait();
    });

    let mut daemon = Daemon::start_with_parent(parent_pid);
    assert!(daemon.socket_path().exists());

    // Parent dies at ~2s; supervisor polls every 2s; drain is bounded.
    let status = daemon
        .wait_exit(Duration::from_secs(40))
        .expect("daemon exits after parent death");
    assert_eq!(status.code(), Some(1), "supervised exit is non-zero");
    assert!(!daemon.pid_path().exists(), "cleanup ran");
}

/// Spawn a raw daemon process against an existing instance's home.
fn spawn_for(existing: &Daemon) -> std::process::Child {
    Command::new(daemon_binary())
        .arg(&existing.instance_id)
        .env("MAYLA_HOME", existing.home.path())
        .current_dir(existing.workspace.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap()
}

/// Wait for READY on a raw child's stdout.
fn wait_ready_raw(child: &mut std::process::Child) {
    use std::io::{BufRead, BufReader};
    let stdout = child.stdout.take().unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    let deadline = std::time::Instant::now() + READY_TIMEOUT;
    loop {
        let remaining = deadline
            .checked_duration_since(std::time::Instant::now())
            .expect("no READY before deadline");
        match rx.recv_timeout(remaining) {
            Ok(line) if line.trim() == "READY" => return,
            Ok(_) => continue,
            Err(_) => panic!("daemon went silent before READY"),
        }
    }
}
