// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier.
//!
//! Mock collaborators that record what the session core asked of them,
//! stores that fail every call or a chosen few, and [`TestHarness`], which
//! wires the whole core onto the in-memory store.

pub mod failing_store;
pub mod flaky_store;
pub mod harness;
pub mod mocks;

pub use failing_store::FailingStore;
pub use flaky_store::FlakyStore;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mocks::{MockAgent, MockInstanceRepository, MockSessionDeleter, MockSessionStarter};
