// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! Every collaborator extends the [`PluginAdapter`] base trait and uses
//! `#[async_trait]` so the components can hold them as `Arc<dyn Trait>`.

pub mod adapter;
pub mod agent;
pub mod kv;
pub mod repository;
pub mod session;

pub use adapter::PluginAdapter;
pub use agent::AgentInvoker;
pub use kv::KvStore;
pub use repository::InstanceRepository;
pub use session::{SessionDeleter, SessionStarter};
