// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC client over a language server's piped stdio.
//!
//! Wire format: `Content-Length: N\r\n\r\n` followed by N bytes of JSON.
//! A reader task dispatches responses to pending requests by id; server
//! notifications are logged and dropped.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lsp_types::{DocumentSymbol, DocumentSymbolResponse, SymbolInformation};
use mayla_core::{Symbol, SymbolKind};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, warn};

use crate::error::LspError;

/// Upper bound on a single framed message body.
const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

type PendingMap = Arc<AsyncMutex<HashMap<i64, oneshot::Sender<Value>>>>;

/// Client half of one language-server subprocess.
#[derive(Debug)]
pub struct LspClient {
    stdin: AsyncMutex<ChildStdin>,
    next_id: AtomicI64,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
}

impl LspClient {
    /// Wrap the subprocess pipes and spawn the reader task.
    pub fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        let pending: PendingMap = Arc::new(AsyncMutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let reader_pending = Arc::clone(&pending);
        let reader_alive = Arc::clone(&alive);
        tokio::spawn(async move {
            if let Err(e) = reader_loop(stdout, Arc::clone(&reader_pending)).await {
                debug!(error = %e, "LSP reader loop ended");
            }
            reader_alive.store(false, Ordering::Release);
            // Drop pending senders so waiting callers fail immediately
            let mut map = reader_pending.lock().await;
            let abandoned = map.len();
            map.clear();
            drop(map);
            if abandoned > 0 {
                warn!(abandoned, "LSP stream closed with requests in flight");
            }
        });

        Self {
            stdin: AsyncMutex::new(stdin),
            next_id: AtomicI64::new(1),
            pending,
            alive,
        }
    }

    /// Whether the server's stdout is still open.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Send a request and await its response under `timeout`.
    pub async fn request(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, LspError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let msg = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.send(&msg).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(LspError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(LspError::Timeout(timeout));
            }
        };

        if let Some(error) = response.get("error") {
            return Err(LspError::ServerError(error.to_string()));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Send a notification; no response expected.
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), LspError> {
        let msg = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.send(&msg).await
    }

    async fn send(&self, msg: &Value) -> Result<(), LspError> {
        if !self.is_alive() {
            return Err(LspError::Closed);
        }
        let body = serde_json::to_string(msg)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        let mut stdin = self.stdin.lock().await;
        stdin.write_all(header.as_bytes()).await?;
        stdin.write_all(body.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// `initialize` + `initialized` handshake against a project root.
    pub async fn initialize(&self, root: &Path, timeout: Duration) -> Result<Value, LspError> {
        let params = json!({
            "processId": std::process::id(),
            "rootUri": file_uri(root),
            "capabilities": {
                "textDocument": {
                    "documentSymbol": {
                        "hierarchicalDocumentSymbolSupport": true
                    }
                }
            },
        });
        let result = self.request("initialize", params, timeout).await?;
        self.notify("initialized", json!({})).await?;
        Ok(result)
    }

    /// `textDocument/documentSymbol`, accepting hierarchical or flat
    /// responses.
    pub async fn document_symbols(
        &self,
        file: &Path,
        timeout: Duration,
    ) -> Result<Vec<Symbol>, LspError> {
        let params = json!({
            "textDocument": { "uri": file_uri(file) },
        });
        let result = self
            .request("textDocument/documentSymbol", params, timeout)
            .await?;
        if result.is_null() {
            return Ok(Vec::new());
        }
        let response: DocumentSymbolResponse = serde_json::from_value(result)
            .map_err(|e| LspError::Protocol(format!("bad documentSymbol response: {e}")))?;
        Ok(flatten_response(response))
    }

    /// LSP `shutdown` request (best-effort budget).
    pub async fn shutdown_request(&self, timeout: Duration) -> Result<(), LspError> {
        self.request("shutdown", Value::Null, timeout).await?;
        Ok(())
    }

    /// LSP `exit` notification.
    pub async fn exit_notification(&self) -> Result<(), LspError> {
        self.notify("exit", Value::Null).await
    }
}

/// Read framed messages from stdout and resolve pending requests.
async fn reader_loop(stdout: ChildStdout, pending: PendingMap) -> Result<(), LspError> {
    let mut reader = BufReader::new(stdout);

    loop {
        let mut content_length: Option<usize> = None;
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                return Ok(()); // stdout closed
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            if let Some(len) = trimmed.strip_prefix("Content-Length:") {
                content_length = len.trim().parse().ok();
            }
        }

        let length = content_length
            .ok_or_else(|| LspError::Protocol("missing Content-Length header".to_string()))?;
        if length > MAX_MESSAGE_SIZE {
            return Err(LspError::Protocol(format!(
                "message of {length} bytes exceeds limit"
            )));
        }

        let mut body = vec![0u8; length];
        reader.read_exact(&mut body).await?;
        let msg: Value = serde_json::from_slice(&body)?;

        if let Some(id) = msg.get("id").and_then(Value::as_i64) {
            let mut map = pending.lock().await;
            if let Some(tx) = map.remove(&id) {
                let _ = tx.send(msg);
            } else {
                debug!(id, "response for unknown request id");
            }
        } else {
            let method = msg.get("method").and_then(Value::as_str).unwrap_or("?");
            debug!(method, "server notification ignored");
        }
    }
}

/// Build a `file://` URI, percent-encoding everything outside the
/// unreserved path set.
pub fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut encoded = String::with_capacity(raw.len() + 7);
    encoded.push_str("file://");
    for &b in raw.as_bytes() {
        let keep = b.is_ascii_alphanumeric()
            || matches!(b, b'-' | b'.' | b'_' | b'~' | b'/');
        if keep {
            encoded.push(char::from(b));
        } else {
            encoded.push('%');
            encoded.push_str(&format!("{b:02X}"));
        }
    }
    encoded
}

fn map_kind(kind: lsp_types::SymbolKind) -> SymbolKind {
    use lsp_types::SymbolKind as K;
    match kind {
        K::FUNCTION => SymbolKind::Function,
        K::METHOD | K::CONSTRUCTOR => SymbolKind::Method,
        K::CLASS => SymbolKind::Class,
        K::INTERFACE => SymbolKind::Interface,
        K::ENUM => SymbolKind::Enum,
        K::STRUCT => SymbolKind::Struct,
        K::CONSTANT => SymbolKind::Const,
        K::MODULE | K::NAMESPACE | K::PACKAGE => SymbolKind::Module,
        K::FIELD | K::PROPERTY | K::ENUM_MEMBER => SymbolKind::Field,
        K::TYPE_PARAMETER => SymbolKind::Type,
        _ => SymbolKind::Variable,
    }
}

/// Flatten either response shape into a single list with 1-based
/// lines/columns.
pub fn flatten_response(response: DocumentSymbolResponse) -> Vec<Symbol> {
    match response {
        DocumentSymbolResponse::Flat(list) => list.into_iter().map(flat_symbol).collect(),
        DocumentSymbolResponse::Nested(list) => {
            let mut out = Vec::new();
            for sym in list {
                push_nested(sym, &mut out);
            }
            out
        }
    }
}

fn flat_symbol(info: SymbolInformation) -> Symbol {
    let range = info.location.range;
    Symbol {
        name: info.name,
        kind: map_kind(info.kind),
        signature: info.container_name,
        line_start: range.start.line + 1,
        line_end: range.end.line + 1,
        column_start: Some(range.start.character + 1),
        column_end: Some(range.end.character + 1),
        visibility: None,
        documentation: None,
        is_exported: false,
    }
}

fn push_nested(sym: DocumentSymbol, out: &mut Vec<Symbol>) {
    out.push(Symbol {
        name: sym.name,
        kind: map_kind(sym.kind),
        signature: sym.detail,
        line_start: sym.range.start.line + 1,
        line_end: sym.range.end.line + 1,
        column_start: Some(sym.selection_range.start.character + 1),
        column_end: Some(sym.selection_range.end.character + 1),
        visibility: None,
        documentation: None,
        is_exported: false,
    });
    for child in sym.children.unwrap_or_default() {
        push_nested(child, out);
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
