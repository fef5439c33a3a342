// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::{json, Value};

use super::*;

#[test]
fn request_round_trips() {
    let request = RpcRequest {
        jsonrpc: Some("2.0".to_string()),
        id: Some(json!(7)),
        method: "tools/call".to_string(),
        params: json!({"name": "symbols", "arguments": {"path": "a.go"}}),
    };
    let encoded = serde_json::to_string(&request).unwrap();
    let decoded: RpcRequest = serde_json::from_str(&encoded).unwrap();
    assert_eq!(request, decoded);
}

#[yare::parameterized(
    missing_id = { json!({"jsonrpc": "2.0", "method": "ping"}), false },
    null_id = { json!({"jsonrpc": "2.0", "id": null, "method": "ping"}), false },
    numeric_id = { json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}), true },
    string_id = { json!({"jsonrpc": "2.0", "id": "a", "method": "ping"}), true },
)]
fn notification_detection(input: Value, wants_response: bool) {
    let request: RpcRequest = serde_json::from_value(input).unwrap();
    assert_eq!(request.wants_response(), wants_response);
}

#[test]
fn success_response_has_no_error_member() {
    let response = RpcResponse::success(json!(1), json!({"ok": true}));
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["jsonrpc"], "2.0");
    assert_eq!(value["result"]["ok"], true);
    assert!(value.get("error").is_none());
}

#[test]
fn error_response_has_no_result_member() {
    let response = RpcResponse::error(json!(1), ERROR_METHOD_NOT_FOUND, "Method not found: x");
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["error"]["code"], ERROR_METHOD_NOT_FOUND);
    assert!(value.get("result").is_none());
}

#[test]
fn parse_error_uses_null_id() {
    let value = serde_json::to_value(RpcResponse::parse_error()).unwrap();
    assert_eq!(value["id"], Value::Null);
    assert_eq!(value["error"]["code"], ERROR_PARSE);
    assert_eq!(value["error"]["message"], "Parse error");
}

#[yare::parameterized(
    exact_match = { Some("2025-03-26"), "2025-03-26" },
    newest = { Some("2025-06-18"), "2025-06-18" },
    unknown = { Some("1999-01-01"), DEFAULT_PROTOCOL_VERSION },
    absent = { None, DEFAULT_PROTOCOL_VERSION },
)]
fn version_negotiation(proposed: Option<&str>, expected: &str) {
    assert_eq!(negotiate_version(proposed), expected);
}
