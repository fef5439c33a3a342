//! The watch → debounce → index pipeline and the query cascade, observed
//! through the tool surface.

use std::time::Duration;

use serde_json::json;

use crate::prelude::*;

#[test]
#[serial_test::serial]
fn workspace_scan_indexes_existing_files() {
    let daemon = Daemon::start();
    std::fs::write(
        daemon.workspace.path().join("main.go"),
        "package main\n\nfunc Foo() {}\n",
    )
    .unwrap();
    // The startup scan ran before the write; the watcher picks it up

    daemon.poll_until(
        || {
            let status = daemon.call_tool("index_status", json!({}));
            status["result"]["files"]["indexed"].as_i64().unwrap_or(0) >= 1
        },
        "file indexed after write",
    );

    let status = daemon.call_tool("index_status", json!({}));
    assert!(status["result"]["symbols"].as_i64().unwrap() >= 1);
}

#[test]
#[serial_test::serial]
fn symbols_query_returns_index_hit_once_fresh() {
    let daemon = Daemon::start();
    let file = daemon.workspace.path().join("a.go");
    std::fs::write(&file, "package a\n\nfunc Foo() {}\n").unwrap();

    // Eventually the index tier answers with cached=true
    daemon.poll_until(
        || {
            let response = daemon.call_tool("symbols", json!({"path": "a.go"}));
            response["result"]["source"] == "index" && response["result"]["cached"] == true
        },
        "index-tier symbols hit",
    );

    let response = daemon.call_tool("symbols", json!({"path": "a.go"}));
    let names: Vec<&str> = response["result"]["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Foo"]);
}

#[test]
#[serial_test::serial]
fn rapid_writes_coalesce_and_reindex_once_settled() {
    let daemon = Daemon::start();
    let file = daemon.workspace.path().join("a.go");
    std::fs::write(&file, "package a\n\nfunc Foo() {}\n").unwrap();

    daemon.poll_until(
        || {
            let response = daemon.call_tool("symbols", json!({"path": "a.go"}));
            response["result"]["source"] == "index"
        },
        "initial index of a.go",
    );

    // Burst of writes within the debounce window, last one adds Bar
    for _ in 0..4 {
        std::fs::write(&file, "package a\n\nfunc Foo() {}\n").unwrap();
        std::thread::sleep(Duration::from_millis(20));
    }
    std::fs::write(&file, "package a\n\nfunc Foo() {}\n\nfunc Bar() {}\n").unwrap();

    daemon.poll_until(
        || {
            let response = daemon.call_tool("symbols", json!({"path": "a.go"}));
            let names: Vec<String> = response["result"]["results"]
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|s| s["name"].as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            response["result"]["source"] == "index"
                && names == vec!["Foo".to_string(), "Bar".to_string()]
        },
        "reindex after the burst settles",
    );
}

#[test]
fn unindexed_file_falls_back_to_regex_scan() {
    let daemon = Daemon::start();
    let file = daemon.workspace.path().join("fresh.go");
    std::fs::write(&file, "package fresh\n\nfunc Brand() {}\n").unwrap();

    // skip_index forces the cascade past the index tier; no Go server is
    // installed in the test environment, so regex answers.
    let response = daemon.call_tool(
        "symbols",
        json!({"path": "fresh.go", "skip_index": true, "skip_lsp": true}),
    );
    assert_eq!(response["result"]["source"], "regex");
    assert_eq!(response["result"]["fallback"], true);
    assert_eq!(response["result"]["results"][0]["name"], "Brand");
}

#[test]
fn references_walk_classifies_sites() {
    let daemon = Daemon::start();
    std::fs::write(
        daemon.workspace.path().join("def.go"),
        "package p\n\nfunc Widget() {}\n",
    )
    .unwrap();
    std::fs::write(
        daemon.workspace.path().join("use.go"),
        "package p\n\nfunc run() {\n\tWidget()\n}\n",
    )
    .unwrap();

    let response = daemon.call_tool(
        "references",
        json!({"symbol": "Widget", "skip_index": true}),
    );
    let results = response["result"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);

    let kinds: Vec<&str> = results.iter().filter_map(|r| r["kind"].as_str()).collect();
    assert!(kinds.contains(&"definition"));
    assert!(kinds.contains(&"usage"));
}

#[test]
#[serial_test::serial]
fn deleted_file_is_pruned_on_next_cycle() {
    let daemon = Daemon::start();
    let file = daemon.workspace.path().join("gone.go");
    std::fs::write(&file, "package p\n\nfunc Doomed() {}\n").unwrap();

    daemon.poll_until(
        || {
            let status = daemon.call_tool("index_status", json!({}));
            status["result"]["files"]["indexed"].as_i64().unwrap_or(0) >= 1
        },
        "file indexed before deletion",
    );

    std::fs::remove_file(&file).unwrap();

    daemon.poll_until(
        || {
            let status = daemon.call_tool("index_status", json!({}));
            status["result"]["files"]["indexed"].as_i64().unwrap_or(-1) == 0
        },
        "record pruned after stat-miss",
    );
}

#[test]
#[serial_test::serial]
fn ignored_directories_never_reach_the_index() {
    let daemon = Daemon::start();
    let nm = daemon.workspace.path().join("node_modules");
    std::fs::create_dir_all(&nm).unwrap();
    std::fs::write(nm.join("dep.js"), "function hidden() {}\n").unwrap();
    std::fs::write(
        daemon.workspace.path().join("kept.js"),
        "function visible() {}\n",
    )
    .unwrap();

    daemon.poll_until(
        || {
            let status = daemon.call_tool("index_status", json!({}));
            status["result"]["files"]["indexed"].as_i64().unwrap_or(0) >= 1
        },
        "kept file indexed",
    );

    let status = daemon.call_tool("index_status", json!({}));
    assert_eq!(
        status["result"]["files"]["indexed"], 1,
        "only the kept file is indexed"
    );
}
