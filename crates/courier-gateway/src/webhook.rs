// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp gateway webhook ingress.
//!
//! Every delivery is acknowledged with `200 OK`; failures are logged and
//! absorbed so the gateway never retries into a storm.

use axum::{Json, body::Bytes, extract::State};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use courier_core::WebhookEnvelope;
use courier_lifecycle::SessionEvent;
use courier_prometheus::record_webhook;
use courier_whatsapp::extract_message;

use crate::server::GatewayState;

/// Acknowledgement returned for every webhook.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    /// Event kind the delivery was classified as.
    pub handled: &'static str,
}

fn ack(handled: &'static str) -> Json<WebhookAck> {
    Json(WebhookAck { ok: true, handled })
}

/// POST /webhooks/whatsapp
pub async fn post_webhook(State(state): State<GatewayState>, body: Bytes) -> Json<WebhookAck> {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "unparseable webhook body");
            record_webhook("invalid");
            return ack("invalid");
        }
    };

    let event = SessionEvent::classify(&envelope);
    let kind = event.kind();
    record_webhook(kind);

    let Some(instance_id) = state.events.resolve_instance(&envelope.session).await else {
        return ack(kind);
    };

    match event {
        SessionEvent::Message => accept_message(&state, &instance_id, envelope.payload).await,
        event => {
            state
                .events
                .handle(&instance_id, &envelope.session, &event)
                .await;
        }
    }

    ack(kind)
}

async fn accept_message(state: &GatewayState, instance_id: &str, payload: Value) {
    let Some(message) = extract_message(&payload) else {
        debug!(instance_id, "message without chat id or body ignored");
        return;
    };
    if message.from_me {
        debug!(instance_id, chat_id = %message.chat_id, "own message ignored");
        return;
    }
    state
        .dispatcher
        .accept_message(instance_id, message, payload)
        .await;
}
