// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-chat message coalescing.
//!
//! Users often send one thought as several quick messages. The
//! [`MessageCoalescer`] buffers them per (instance, chat), waits for the chat
//! to go quiet, and hands the merged text to the agent once, guarded by a
//! leased busy lock so only one pass drains a chat at a time.
//! [`CoalescingDispatcher`] runs that pass against an [`AgentInvoker`](courier_core::AgentInvoker).

pub mod coalescer;
pub mod dispatch;

pub use coalescer::{ChatBatch, CoalesceOutcome, DequeueOutcome, EnqueueOutcome, MessageCoalescer};
pub use dispatch::{Accepted, CoalescingDispatcher};
