// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway session RPC and the delete-instance job action.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::JobId;

/// Starts a gateway session.
///
/// Implementations may fail; callers must not assume any retry underneath.
#[async_trait]
pub trait SessionStarter: PluginAdapter {
    async fn start_session(&self, session: &str) -> Result<(), CourierError>;
}

/// Enqueues the destructive "delete this instance" job.
#[async_trait]
pub trait SessionDeleter: PluginAdapter {
    async fn queue_session_delete(&self, instance_id: &str) -> Result<JobId, CourierError>;
}
