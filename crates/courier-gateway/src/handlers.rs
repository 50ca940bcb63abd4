// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator endpoints: session-start trigger, queue view, health, metrics.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use courier_lifecycle::QueueSnapshot;

use crate::server::GatewayState;

/// Optional request body for POST /v1/sessions/{session}/start.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartRequest {
    #[serde(default)]
    pub instance_id: Option<String>,
}

/// Response body for POST /v1/sessions/{session}/start.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session: String,
    /// Queue length right after the append.
    pub position: usize,
}

/// Response body for GET /v1/queue.
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub depth: usize,
    pub processing_count: usize,
    #[serde(flatten)]
    pub snapshot: QueueSnapshot,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// POST /v1/sessions/{session}/start
///
/// Queues a session start. The body is optional.
pub async fn post_session_start(
    State(state): State<GatewayState>,
    Path(session): Path<String>,
    body: Bytes,
) -> Response {
    let request = if body.is_empty() {
        StartRequest::default()
    } else {
        match serde_json::from_slice::<StartRequest>(&body) {
            Ok(request) => request,
            Err(e) => return error(StatusCode::BAD_REQUEST, format!("invalid body: {e}")),
        }
    };

    match state
        .start_queue
        .queue_session_start(&session, request.instance_id.as_deref())
        .await
    {
        Ok(position) => (
            StatusCode::ACCEPTED,
            Json(StartResponse { session, position }),
        )
            .into_response(),
        Err(e) => {
            warn!(session, error = %e, "failed to queue session start");
            error(StatusCode::SERVICE_UNAVAILABLE, "session queue unavailable")
        }
    }
}

/// GET /v1/queue
pub async fn get_queue(State(state): State<GatewayState>) -> Response {
    match state.start_queue.snapshot().await {
        Ok(snapshot) => Json(QueueResponse {
            depth: snapshot.queued.len(),
            processing_count: snapshot.processing.len(),
            snapshot,
        })
        .into_response(),
        Err(e) => {
            warn!(error = %e, "failed to read session queue");
            error(StatusCode::SERVICE_UNAVAILABLE, "session queue unavailable")
        }
    }
}

/// GET /health
///
/// Healthy when the shared store answers a ping.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let version = env!("CARGO_PKG_VERSION");
    match state.store.ping().await {
        Ok(()) => Json(HealthResponse {
            status: "ok",
            version,
            error: None,
        })
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable",
                version,
                error: Some(e.to_string()),
            }),
        )
            .into_response(),
    }
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.metrics {
        Some(metrics) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            metrics.render(),
        )
            .into_response(),
        None => error(StatusCode::NOT_FOUND, "metrics disabled"),
    }
}
