// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The socket server and JSON-RPC dispatcher.
//!
//! Each connection carries a stream of JSON values: objects are single
//! requests, arrays are batches. Parsing is strictly sequential per
//! connection; execution is not: each decoded value is handled in its
//! own task and responses are written in completion order. A bounded
//! semaphore admission-controls tool executions across all connections.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::registry::ToolRegistry;
use crate::rpc::{
    negotiate_version, RpcRequest, RpcResponse, BUSY_MESSAGE, ERROR_INTERNAL,
    ERROR_METHOD_NOT_FOUND,
};
use crate::tools::TOOL_CALL_TIMEOUT;

/// Concurrent tool executions across all connections.
const MAX_CONCURRENT_TOOLS: usize = 50;

/// How long a request may wait for admission before "busy".
const ADMISSION_WAIT: Duration = Duration::from_secs(30);

/// Idle deadline refreshed before each decode.
const READ_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Cap on draining in-flight handlers at shutdown.
const DRAIN_CAP: Duration = Duration::from_secs(30);

/// Read chunk size.
const READ_CHUNK: usize = 8 * 1024;

/// Shared dispatcher context.
pub struct ServerCtx {
    pub registry: Arc<ToolRegistry>,
    pub semaphore: Arc<Semaphore>,
    shutting_down: AtomicBool,
}

impl ServerCtx {
    pub fn new(registry: Arc<ToolRegistry>) -> Arc<Self> {
        Self::with_limit(registry, MAX_CONCURRENT_TOOLS)
    }

    /// Test hook: a smaller admission window.
    pub fn with_limit(registry: Arc<ToolRegistry>, limit: usize) -> Arc<Self> {
        Arc::new(Self {
            registry,
            semaphore: Arc::new(Semaphore::new(limit)),
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

/// The accept loop plus connection bookkeeping.
pub struct RpcServer {
    listener: UnixListener,
    ctx: Arc<ServerCtx>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl RpcServer {
    pub fn new(listener: UnixListener, ctx: Arc<ServerCtx>) -> Arc<Self> {
        Arc::new(Self {
            listener,
            ctx,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }

    /// Accept connections until shutdown.
    pub async fn run(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let ctx = Arc::clone(&self.ctx);
                        let cancel = self.cancel.child_token();
                        let tracker = self.tracker.clone();
                        self.tracker.spawn(handle_connection(stream, ctx, cancel, tracker));
                    }
                    Err(e) => {
                        error!(error = %e, "accept error");
                    }
                },
            }
        }
        debug!("accept loop stopped");
    }

    /// Flip the shutting-down flag, stop accepting, close connections and
    /// drain handlers under the cap.
    pub async fn shutdown(&self) {
        self.ctx.shutting_down.store(true, Ordering::Release);
        self.cancel.cancel();
        self.tracker.close();
        if tokio::time::timeout(DRAIN_CAP, self.tracker.wait())
            .await
            .is_err()
        {
            warn!("drain cap exceeded, abandoning in-flight handlers");
        } else {
            info!("all connection handlers drained");
        }
    }
}

/// One client connection: sequential decode, concurrent handling,
/// completion-order responses.
async fn handle_connection(
    stream: UnixStream,
    ctx: Arc<ServerCtx>,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    let (mut read_half, write_half) = stream.into_split();
    let (resp_tx, resp_rx) = mpsc::channel::<String>(32);

    let writer = tokio::spawn(writer_loop(write_half, resp_rx, Arc::clone(&ctx)));

    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    'conn: loop {
        // Drain every complete value already buffered
        loop {
            match extract_value(&mut buf) {
                Ok(Some(value)) => {
                    let ctx = Arc::clone(&ctx);
                    let resp_tx = resp_tx.clone();
                    tracker.spawn(async move {
                        if let Some(response) = handle_value(value, &ctx).await {
                            let _ = resp_tx.send(response).await;
                        }
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    // Framing is lost; answer with a parse error and close
                    debug!(error = %e, "malformed JSON on connection");
                    if let Ok(response) = serde_json::to_string(&RpcResponse::parse_error()) {
                        let _ = resp_tx.send(response).await;
                    }
                    break 'conn;
                }
            }
        }

        // Refresh the read deadline and pull more bytes
        let mut chunk = vec![0u8; READ_CHUNK];
        tokio::select! {
            _ = cancel.cancelled() => break 'conn,
            read = tokio::time::timeout(READ_DEADLINE, read_half.read(&mut chunk)) => {
                match read {
                    Err(_) => {
                        debug!("connection idle past deadline, closing");
                        break 'conn;
                    }
                    Ok(Ok(0)) => break 'conn,
                    Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
                    Ok(Err(e)) => {
                        debug!(error = %e, "connection read error");
                        break 'conn;
                    }
                }
            }
        }
    }

    drop(resp_tx);
    let _ = writer.await;
}

/// Encode-and-write task. Checks the shutting-down flag before each
/// encode so no response is written once shutdown begins.
async fn writer_loop(
    mut write_half: OwnedWriteHalf,
    mut resp_rx: mpsc::Receiver<String>,
    ctx: Arc<ServerCtx>,
) {
    while let Some(response) = resp_rx.recv().await {
        if ctx.is_shutting_down() {
            break;
        }
        if write_half.write_all(response.as_bytes()).await.is_err() {
            break;
        }
        if write_half.write_all(b"\n").await.is_err() {
            break;
        }
        if write_half.flush().await.is_err() {
            break;
        }
    }
}

/// Pull the first complete JSON value off the buffer, if any.
fn extract_value(buf: &mut Vec<u8>) -> Result<Option<Value>, serde_json::Error> {
    let mut iter = serde_json::Deserializer::from_slice(buf).into_iter::<Value>();
    match iter.next() {
        Some(Ok(value)) => {
            let consumed = iter.byte_offset();
            buf.drain(..consumed);
            Ok(Some(value))
        }
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(e),
        None => Ok(None),
    }
}

/// Handle one decoded top-level value. `None` means nothing to write
/// (notifications, or an all-notification batch).
pub(crate) async fn handle_value(value: Value, ctx: &Arc<ServerCtx>) -> Option<String> {
    match value {
        Value::Array(elements) => {
            if elements.is_empty() {
                return serde_json::to_string(&RpcResponse::parse_error()).ok();
            }
            // Batch elements execute concurrently; replies are collected
            // in input order, notifications contribute nothing.
            let mut handles = Vec::with_capacity(elements.len());
            for element in elements {
                let ctx = Arc::clone(ctx);
                handles.push(tokio::spawn(
                    async move { handle_element(element, &ctx).await },
                ));
            }
            let mut responses = Vec::new();
            for handle in handles {
                match handle.await {
                    Ok(Some(response)) => responses.push(response),
                    Ok(None) => {}
                    Err(e) => error!(error = %e, "batch element task failed"),
                }
            }
            if responses.is_empty() {
                // All notifications: JSON-RPC 2.0 says return nothing
                None
            } else {
                serde_json::to_string(&responses).ok()
            }
        }
        other => {
            let response = handle_element(other, ctx).await?;
            serde_json::to_string(&response).ok()
        }
    }
}

/// Parse and dispatch one request object.
async fn handle_element(value: Value, ctx: &Arc<ServerCtx>) -> Option<RpcResponse> {
    let request: RpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(_) => return Some(RpcResponse::parse_error()),
    };
    handle_request(request, ctx).await
}

/// Route a request by method.
async fn handle_request(request: RpcRequest, ctx: &Arc<ServerCtx>) -> Option<RpcResponse> {
    let wants_response = request.wants_response();
    let id = request.response_id();
    let method = request.method.clone();

    match method.as_str() {
        "initialize" => {
            let proposed = request
                .params
                .get("protocolVersion")
                .and_then(Value::as_str);
            let result = serde_json::json!({
                "protocolVersion": negotiate_version(proposed),
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "mayla-daemon",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            });
            wants_response.then(|| RpcResponse::success(id, result))
        }

        "notifications/initialized" => None,

        "ping" => wants_response.then(|| RpcResponse::success(id, serde_json::json!({}))),

        "tools/list" => {
            let result = serde_json::json!({ "tools": ctx.registry.list() });
            wants_response.then(|| RpcResponse::success(id, result))
        }

        "tools/call" => handle_tool_call(request, ctx).await,

        other => {
            debug!(method = other, "unknown method");
            wants_response.then(|| {
                RpcResponse::error(
                    id,
                    ERROR_METHOD_NOT_FOUND,
                    format!("Method not found: {other}"),
                )
            })
        }
    }
}

/// Admission-control and run a tool.
async fn handle_tool_call(request: RpcRequest, ctx: &Arc<ServerCtx>) -> Option<RpcResponse> {
    let wants_response = request.wants_response();
    let id = request.response_id();

    let permit = match tokio::time::timeout(
        ADMISSION_WAIT,
        Arc::clone(&ctx.semaphore).acquire_owned(),
    )
    .await
    {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => {
            // Semaphore closed: daemon is going away
            return wants_response
                .then(|| RpcResponse::error(id, ERROR_INTERNAL, "server shutting down"));
        }
        Err(_) => {
            return wants_response.then(|| RpcResponse::error(id, ERROR_INTERNAL, BUSY_MESSAGE));
        }
    };

    let Some(name) = request
        .params
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
    else {
        drop(permit);
        return wants_response
            .then(|| RpcResponse::error(id, ERROR_INTERNAL, "tool name required"));
    };
    let args = request
        .params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    let result = ctx
        .registry
        .execute_with_timeout(&name, args, TOOL_CALL_TIMEOUT)
        .await;
    drop(permit);

    match result {
        Ok(value) => wants_response.then(|| RpcResponse::success(id, value)),
        Err(e) => wants_response.then(|| RpcResponse::error(id, ERROR_INTERNAL, e.to_string())),
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
