// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 envelope types for the client-facing socket.
//!
//! Framing is length-agnostic: consecutive JSON values on the stream are
//! consecutive requests; an array is a batch. A request without an id (or
//! with a null id) is a notification and produces no response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard JSON-RPC error codes used by the daemon.
pub const ERROR_PARSE: i64 = -32700;
pub const ERROR_METHOD_NOT_FOUND: i64 = -32601;
pub const ERROR_INTERNAL: i64 = -32603;

/// Protocol versions the daemon can negotiate, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Version offered when the client proposes nothing we support.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-06-18";

/// Message shown for admission-control rejection.
pub const BUSY_MESSAGE: &str = "server busy, try again later";

/// An incoming request (or notification).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl RpcRequest {
    /// Notifications (no id, or a null id) never produce responses.
    pub fn wants_response(&self) -> bool {
        matches!(&self.id, Some(id) if !id.is_null())
    }

    /// The response id for this request (null for notifications).
    pub fn response_id(&self) -> Value {
        self.id.clone().unwrap_or(Value::Null)
    }
}

/// Error member of a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An outgoing response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// The canonical parse-error response (id is always null).
    pub fn parse_error() -> Self {
        Self::error(Value::Null, ERROR_PARSE, "Parse error")
    }
}

/// Pick the protocol version to answer `initialize` with.
pub fn negotiate_version(proposed: Option<&str>) -> &'static str {
    proposed
        .and_then(|p| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|v| **v == p))
        .copied()
        .unwrap_or(DEFAULT_PROTOCOL_VERSION)
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
