// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Storage error types.

/// Statuses of the index capability consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("key already exists")]
    AlreadyExists,

    #[error("key not found")]
    NotFound,

    #[error("record concurrently deleted")]
    ConcurrentDelete,
}
