// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the lifecycle, coalescing, and gateway crates.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Canonical status of a WhatsApp instance, as persisted to the relational store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Busy flag of the agent serving one (instance, chat) pair.
///
/// In the shared store `Processing` is a leased key; an absent key reads as `Idle`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentStatus {
    Idle,
    Processing,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    KvStore,
    Repository,
    SessionGateway,
    JobRunner,
    Agent,
    Metrics,
}

/// Identifier returned by the job runner for an enqueued job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

/// A pending "start this gateway session" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub session: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// The fields of an inbound chat message the coalescer cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Provider message id, used for duplicate suppression.
    #[serde(default)]
    pub id: Option<String>,
    /// Chat (conversation) identifier, e.g. `5511999999999@c.us`.
    pub chat_id: String,
    /// Text body.
    pub body: String,
    /// Provider send time in milliseconds since the epoch, if the webhook carried one.
    #[serde(default)]
    pub sent_at_ms: Option<i64>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub has_media: bool,
}

/// One buffered message event for one chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageQueueItem {
    pub message: InboundMessage,
    pub raw_body: Value,
    /// Ordering timestamp in milliseconds.
    pub timestamp: i64,
}

/// Webhook body sent by the WhatsApp gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub payload: Value,
}

/// A coalesced batch handed to the downstream agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub instance_id: String,
    pub chat_id: String,
    pub combined_content: String,
    pub first_message: InboundMessage,
    pub message_count: usize,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn instance_status_uses_lowercase_vocabulary() {
        assert_eq!(InstanceStatus::Connected.to_string(), "connected");
        assert_eq!(
            InstanceStatus::from_str("disconnected").unwrap(),
            InstanceStatus::Disconnected
        );
        let json = serde_json::to_string(&InstanceStatus::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
    }

    #[test]
    fn agent_status_uses_uppercase_vocabulary() {
        assert_eq!(AgentStatus::Processing.to_string(), "PROCESSING");
        assert_eq!(AgentStatus::from_str("IDLE").unwrap(), AgentStatus::Idle);
    }

    #[test]
    fn queue_entry_omits_missing_instance() {
        let entry = QueueEntry {
            session: "default".into(),
            instance_id: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"session":"default"}"#);
        let back: QueueEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn envelope_tolerates_missing_payload() {
        let env: WebhookEnvelope =
            serde_json::from_str(r#"{"event":"ready","session":"s1"}"#).unwrap();
        assert_eq!(env.event, "ready");
        assert!(env.payload.is_null());
    }
}
