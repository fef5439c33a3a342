// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mayla Daemon library
//!
//! This module exposes the JSON-RPC envelope types for use by client
//! adapters.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod rpc;

pub use rpc::{
    negotiate_version, RpcError, RpcRequest, RpcResponse, BUSY_MESSAGE,
    DEFAULT_PROTOCOL_VERSION, ERROR_INTERNAL, ERROR_METHOD_NOT_FOUND, ERROR_PARSE,
    SUPPORTED_PROTOCOL_VERSIONS,
};
