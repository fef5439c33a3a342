//! Wire behavior: JSON-RPC dispatch, batches, notifications, errors.

use serde_json::{json, Value};

use crate::prelude::*;

#[test]
fn ping_pong() {
    let daemon = Daemon::start();
    let response = daemon.request(&json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"], json!({}));
}

#[test]
fn initialize_reports_capabilities_and_version() {
    let daemon = Daemon::start();
    let response = daemon.request(&json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {"protocolVersion": "2025-06-18"},
    }));
    let result = &response["result"];
    assert_eq!(result["protocolVersion"], "2025-06-18");
    assert!(result["capabilities"]["tools"].is_object());
    assert_eq!(result["serverInfo"]["name"], "mayla-daemon");
}

#[test]
fn unsupported_protocol_version_falls_back_to_default() {
    let daemon = Daemon::start();
    let response = daemon.request(&json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {"protocolVersion": "1999-12-31"},
    }));
    let negotiated = response["result"]["protocolVersion"].as_str().unwrap();
    assert_ne!(negotiated, "1999-12-31");
}

#[test]
fn tools_list_includes_the_builtin_catalog() {
    let daemon = Daemon::start();
    let response = daemon.request(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}));
    let tools = response["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    similar_asserts::assert_eq!(names, vec!["symbols", "references", "index_status"]);

    for tool in tools {
        assert!(tool["description"].is_string());
        assert!(tool["inputSchema"].is_object());
    }
}

#[test]
fn unknown_method_returns_32601() {
    let daemon = Daemon::start();
    let response = daemon.request(&json!({"jsonrpc": "2.0", "id": 1, "method": "no/such"}));
    assert_eq!(response["error"]["code"], -32601);
    assert_eq!(response["error"]["message"], "Method not found: no/such");
}

#[test]
fn malformed_json_returns_parse_error_with_null_id() {
    let daemon = Daemon::start();
    let line = daemon.request_raw(b"this is not json").unwrap();
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["error"]["code"], -32700);
}

#[test]
fn batch_collects_non_notification_replies() {
    let daemon = Daemon::start();
    let line = daemon
        .request_raw(
            br#"[
                {"jsonrpc":"2.0","id":1,"method":"ping"},
                {"jsonrpc":"2.0","method":"notifications/initialized"},
                {"jsonrpc":"2.0","id":2,"method":"no/such"}
            ]"#,
        )
        .unwrap();
    let response: Value = serde_json::from_str(&line).unwrap();
    let entries = response.as_array().unwrap();
    assert_eq!(entries.len(), 2);

    let by_id = |id: i64| {
        entries
            .iter()
            .find(|e| e["id"] == json!(id))
            .unwrap_or_else(|| panic!("no entry for id {id}"))
    };
    assert_eq!(by_id(1)["result"], json!({}));
    assert_eq!(by_id(2)["error"]["code"], -32601);
}

#[test]
fn notification_then_request_only_answers_the_request() {
    let daemon = Daemon::start();
    let payload =
        br#"{"jsonrpc":"2.0","method":"notifications/initialized"}{"jsonrpc":"2.0","id":7,"method":"ping"}"#;
    let line = daemon.request_raw(payload).unwrap();
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["id"], 7);
}

#[test]
fn multiple_requests_per_connection() {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;

    let daemon = Daemon::start();
    let mut stream = UnixStream::connect(daemon.socket_path()).unwrap();
    stream
        .set_read_timeout(Some(REQUEST_TIMEOUT))
        .unwrap();

    let mut reader = BufReader::new(stream.try_clone().unwrap());
    for id in 1..=3 {
        let payload = json!({"jsonrpc": "2.0", "id": id, "method": "ping"}).to_string();
        stream.write_all(payload.as_bytes()).unwrap();
        stream.flush().unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let response: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response["id"], id);
    }
}

#[test]
fn tool_error_is_wrapped_as_internal_error() {
    let daemon = Daemon::start();
    let response = daemon.call_tool("symbols", json!({}));
    assert_eq!(response["error"]["code"], -32603, "missing path argument");
}
