// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Epoch management.
//!
//! The engine divides time into coarse, globally-ordered epochs. Epochs
//! bound transaction-id growth (the version word's epoch field) and batch
//! log flushes into group commits. This module owns every epoch counter in
//! the process:
//!
//! - the **global epoch**, advanced only by the leader worker;
//! - each worker's **local epoch**, its last observation of the global one;
//! - each worker's **commit-tid watermark**, keeping commit ids monotonic
//!   across epochs;
//! - each logger's **durable epoch** and the process-wide minimum, below
//!   which every commit is guaranteed persisted.
//!
//! All state is atomic and lock-free; the leader protocol never lets the
//! global epoch outrun the slowest worker's observation.

mod clock;

pub use clock::{EpochClock, INITIAL_EPOCH};
