// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for sensorcast.

use thiserror::Error;

/// Errors surfaced by address parsing, block transfers and resource handling.
///
/// Registry operations (`join`, `leave`, `dispatch`) never fail: capacity
/// exhaustion is resolved by the eviction policy documented on
/// [`GroupRegistry`](crate::group::GroupRegistry).
#[derive(Debug, Error)]
pub enum Error {
    /// Address text is not a multicast IPv6 literal.
    #[error("Malformed multicast address: {0}")]
    MalformedAddress(String),

    /// Block offset is beyond the per-message transfer budget.
    #[error("Block offset {offset} out of scope (limit {limit})")]
    RangeExceeded { offset: usize, limit: usize },

    /// Message assembly failed or produced no bytes.
    #[error("Render failure: {0}")]
    RenderFailure(String),

    /// Chunk math found no bytes left at the given offset.
    #[error("Transfer length error: offset {offset} with message length {length}")]
    TransferLength { offset: usize, length: usize },

    /// No resource at the requested path.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource exists but does not accept the method.
    #[error("Method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    /// Malformed CoAP datagram.
    #[error("Frame error: {0}")]
    Frame(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
