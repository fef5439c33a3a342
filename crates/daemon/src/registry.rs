// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tool registry: a name-indexed catalog of operations.
//!
//! Registration happens once at startup; lookup and execution are
//! read-only afterwards. Execution runs in a spawned task so a panicking
//! tool is caught and reported instead of taking the daemon down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

/// Behavioral hints surfaced with a tool listing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolAnnotations {
    #[serde(rename = "readOnlyHint", skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(rename = "destructiveHint", skip_serializing_if = "Option::is_none")]
    pub destructive: Option<bool>,
    #[serde(rename = "idempotentHint", skip_serializing_if = "Option::is_none")]
    pub idempotent: Option<bool>,
    #[serde(rename = "openWorldHint", skip_serializing_if = "Option::is_none")]
    pub open_world: Option<bool>,
}

impl ToolAnnotations {
    /// The common shape for query tools.
    pub fn read_only() -> Self {
        Self {
            read_only: Some(true),
            destructive: Some(false),
            idempotent: Some(true),
            open_world: Some(false),
        }
    }
}

/// Errors surfaced by tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    Unknown(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Failed(String),

    #[error("tool timed out after {0:?}")]
    Timeout(Duration),

    #[error("tool panicked: {0}")]
    Panicked(String),
}

/// Registration errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool {0:?} is already registered")]
    Duplicate(String),
}

/// One operation in the catalog.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn title(&self) -> Option<&str> {
        None
    }

    fn annotations(&self) -> Option<ToolAnnotations> {
        None
    }

    /// JSON Schema for the arguments object.
    fn input_schema(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Name → operation mapping. Built once, then shared read-only.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Duplicate names fail.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The `tools/list` payload, in registration order.
    pub fn list(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                let mut entry = json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "inputSchema": tool.input_schema(),
                });
                if let Some(title) = tool.title() {
                    entry["title"] = json!(title);
                }
                if let Some(annotations) = tool.annotations() {
                    entry["annotations"] = json!(annotations);
                }
                entry
            })
            .collect()
    }

    /// Execute a tool under a deadline, with panic isolation.
    ///
    /// The tool future runs in its own task: a panic surfaces as a
    /// [`ToolError::Panicked`] instead of unwinding the daemon, and a
    /// deadline expiry aborts the task.
    pub async fn execute_with_timeout(
        &self,
        name: &str,
        args: Value,
        deadline: Duration,
    ) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;

        let handle = tokio::spawn(async move { tool.execute(args).await });
        let aborter = handle.abort_handle();

        match tokio::time::timeout(deadline, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    let panic = join_err.into_panic();
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(tool = name, panic = %message, "tool panicked");
                    Err(ToolError::Panicked(message))
                } else {
                    Err(ToolError::Failed("tool task cancelled".to_string()))
                }
            }
            Err(_) => {
                aborter.abort();
                Err(ToolError::Timeout(deadline))
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
