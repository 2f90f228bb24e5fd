// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tandem integration tests.
//!
//! - [`MemoryIdentityStore`] - in-memory identity store with the same
//!   pairing semantics as SQLite, plus fault injection
//! - [`TestHarness`] - a wired [`SyncHub`](tandem_sync::SyncHub) with user,
//!   pairing and connection helpers

pub mod harness;
pub mod memory_store;

pub use harness::{TestConnection, TestHarness, TestHarnessBuilder};
pub use memory_store::MemoryIdentityStore;
