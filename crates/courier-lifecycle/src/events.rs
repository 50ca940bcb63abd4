// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session webhook state machine.
//!
//! Every gateway webhook is classified into a [`SessionEvent`]. Each kind
//! declares the [`StatusChange`] it implies, and [`SessionEventHandler`]
//! applies that change in a single persistence step before updating the
//! QR streak for the session.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use courier_core::{InstanceRepository, InstanceStatus, WebhookEnvelope};

use crate::qr_guard::{QrScanGuard, ScanOutcome};
use crate::status::{map_connection_state, map_provider_status};

const SCAN_QR_CODE: &str = "SCAN_QR_CODE";

/// A classified gateway webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Any event whose name starts with `message`.
    Message,
    /// `session.status` with the gateway's status string.
    StatusChanged { status: String },
    /// `connection.update` with its `connection` field.
    ConnectionUpdate { state: String },
    Authenticated,
    Ready,
    /// A fresh QR code was issued for an unpaired device.
    QrCode,
    /// Anything else; carries the event name.
    Other(String),
}

/// The status effect of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Set(InstanceStatus),
    Unchanged,
}

fn payload_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload.get(field).and_then(Value::as_str)
}

/// `qr`, `qrcode.updated`, `QRCODE_UPDATED` and provider variants thereof.
fn is_qr_event_name(event: &str) -> bool {
    event.to_ascii_lowercase().contains("qr")
}

impl SessionEvent {
    pub fn classify(envelope: &WebhookEnvelope) -> Self {
        let event = envelope.event.as_str();
        let payload = &envelope.payload;

        if event.starts_with("message") {
            return Self::Message;
        }
        match event {
            "session.status" => Self::StatusChanged {
                status: payload_str(payload, "status").unwrap_or_default().to_string(),
            },
            "connection.update" => Self::ConnectionUpdate {
                state: payload_str(payload, "connection")
                    .or_else(|| payload_str(payload, "state"))
                    .unwrap_or_default()
                    .to_string(),
            },
            "authenticated" => Self::Authenticated,
            "ready" => Self::Ready,
            _ if is_qr_event_name(event) => Self::QrCode,
            _ => Self::Other(event.to_string()),
        }
    }

    /// Short label used in logs, metrics, and the webhook response.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::StatusChanged { .. } => "session.status",
            Self::ConnectionUpdate { .. } => "connection.update",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::QrCode => "qr",
            Self::Other(_) => "other",
        }
    }

    /// True for events that mean "the device still needs to scan a QR code".
    pub fn is_qr(&self) -> bool {
        match self {
            Self::QrCode => true,
            Self::StatusChanged { status } => status.eq_ignore_ascii_case(SCAN_QR_CODE),
            _ => false,
        }
    }

    pub fn status_change(&self) -> StatusChange {
        match self {
            Self::StatusChanged { status } => StatusChange::Set(map_provider_status(status)),
            Self::ConnectionUpdate { state } => {
                map_connection_state(state).map_or(StatusChange::Unchanged, StatusChange::Set)
            }
            Self::Authenticated | Self::Ready => StatusChange::Set(InstanceStatus::Connected),
            Self::Message | Self::QrCode | Self::Other(_) => StatusChange::Unchanged,
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusChanged { status } => write!(f, "session.status({status})"),
            Self::ConnectionUpdate { state } => write!(f, "connection.update({state})"),
            Self::Other(name) => write!(f, "other({name})"),
            other => f.write_str(other.kind()),
        }
    }
}

/// What handling one session event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventOutcome {
    /// Status written to the repository, if any write succeeded.
    pub persisted: Option<InstanceStatus>,
    /// Set when the event was a QR event.
    pub scan: Option<ScanOutcome>,
}

/// Applies session events to the instance repository and the QR guard.
#[derive(Clone)]
pub struct SessionEventHandler {
    repository: Arc<dyn InstanceRepository>,
    qr_guard: QrScanGuard,
}

impl SessionEventHandler {
    pub fn new(repository: Arc<dyn InstanceRepository>, qr_guard: QrScanGuard) -> Self {
        Self {
            repository,
            qr_guard,
        }
    }

    /// Looks up the instance behind a gateway session. Failures read as unknown.
    pub async fn resolve_instance(&self, session: &str) -> Option<String> {
        match self.repository.instance_for_session(session).await {
            Ok(Some(instance_id)) => Some(instance_id),
            Ok(None) => {
                info!(session, "webhook for unknown session ignored");
                None
            }
            Err(e) => {
                warn!(session, error = %e, "failed to resolve instance for session");
                None
            }
        }
    }

    /// Handles a non-message event for a resolved instance. Never fails.
    pub async fn handle(
        &self,
        instance_id: &str,
        session: &str,
        event: &SessionEvent,
    ) -> EventOutcome {
        debug!(instance_id, session, %event, "handling session event");

        let persisted = self.apply(instance_id, event.status_change()).await;

        let scan = if event.is_qr() {
            Some(self.qr_guard.track_scan(instance_id, session).await)
        } else {
            self.qr_guard.reset_scan_count(instance_id, session).await;
            None
        };

        EventOutcome { persisted, scan }
    }

    async fn apply(&self, instance_id: &str, change: StatusChange) -> Option<InstanceStatus> {
        let StatusChange::Set(status) = change else {
            return None;
        };
        match self
            .repository
            .update_instance_status(instance_id, status, Utc::now())
            .await
        {
            Ok(()) => {
                info!(instance_id, %status, "instance status updated");
                Some(status)
            }
            Err(e) => {
                warn!(instance_id, %status, error = %e, "failed to persist instance status");
                None
            }
        }
    }
}

impl fmt::Debug for SessionEventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEventHandler")
            .field("qr_guard", &self.qr_guard)
            .finish_non_exhaustive()
    }
}
