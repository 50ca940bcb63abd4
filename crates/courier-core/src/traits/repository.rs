// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relational instance store consumed by the session-event handler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::InstanceStatus;

/// The slice of the relational store the session core writes to.
#[async_trait]
pub trait InstanceRepository: PluginAdapter {
    /// Resolves the instance that owns a gateway session name.
    async fn instance_for_session(&self, session: &str) -> Result<Option<String>, CourierError>;

    /// Persists a new canonical status for an instance.
    async fn update_instance_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), CourierError>;
}
