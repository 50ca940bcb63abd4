// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp-side collaborators of the session core.
//!
//! HTTP clients for the gateway's session RPC ([`GatewayClient`]), the job
//! runner's delete action ([`JobRunnerClient`]), and the downstream agent
//! ([`HttpAgent`]), plus webhook payload parsing ([`payload`]).

pub mod agent;
mod client;
pub mod gateway;
pub mod jobs;
pub mod payload;

pub use agent::HttpAgent;
pub use gateway::GatewayClient;
pub use jobs::JobRunnerClient;
pub use payload::extract_message;
