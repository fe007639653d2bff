// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Log pipeline error types.

/// Errors from the write-ahead-log pipeline.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The pool had no current buffer where the protocol requires one.
    /// This is a configuration or pool-sizing bug, not a transient state;
    /// the worker hitting it terminates.
    #[error("log buffer pool exhausted: no current buffer")]
    BufferExhausted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
