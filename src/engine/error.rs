// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Engine error types.

use crate::log::LogError;

/// Errors surfaced by the host control surface.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("worker {0} is not in the requested logger group")]
    UnknownWorker(usize),

    #[error("unknown logger {0}")]
    UnknownLogger(usize),

    /// A worker's log buffer pool ran dry where the protocol requires a
    /// buffer. Terminates the worker; not retryable.
    #[error("log buffer pool exhausted on worker {0}")]
    BufferExhaustion(usize),

    #[error("log pipeline error: {0}")]
    Log(#[from] LogError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
