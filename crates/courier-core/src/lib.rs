// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier session-lifecycle service.
//!
//! This crate holds the error type, the domain types shared by every
//! component, and the narrow collaborator traits (shared key-value store,
//! instance repository, gateway session RPC, delete-job runner, agent) that
//! the lifecycle and coalescing components are written against.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    AdapterType, AgentRequest, AgentStatus, HealthStatus, InboundMessage, InstanceStatus, JobId,
    MessageQueueItem, QueueEntry, WebhookEnvelope,
};

pub use traits::{
    AgentInvoker, InstanceRepository, KvStore, PluginAdapter, SessionDeleter, SessionStarter,
};
