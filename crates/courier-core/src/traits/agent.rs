// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downstream agent that receives coalesced chat batches.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::AgentRequest;

#[async_trait]
pub trait AgentInvoker: PluginAdapter {
    /// Hands one coalesced batch to the agent and waits for it to finish.
    async fn invoke(&self, request: AgentRequest) -> Result<(), CourierError>;
}
