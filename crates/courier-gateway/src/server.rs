// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use courier_coalescer::CoalescingDispatcher;
use courier_core::{CourierError, KvStore};
use courier_lifecycle::{SessionEventHandler, SessionStartQueue};
use courier_prometheus::PrometheusAdapter;

use crate::{handlers, webhook};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Shared store, pinged by the health endpoint.
    pub store: Arc<dyn KvStore>,
    /// Session-status state machine and QR guard.
    pub events: SessionEventHandler,
    pub start_queue: SessionStartQueue,
    pub dispatcher: CoalescingDispatcher,
    /// Prometheus renderer; `/metrics` answers 404 when absent.
    pub metrics: Option<PrometheusAdapter>,
}

/// Gateway server configuration (mirrors `ServerConfig` from courier-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the application router.
///
/// - POST /webhooks/whatsapp
/// - POST /v1/sessions/{session}/start
/// - GET /v1/queue
/// - GET /health
/// - GET /metrics
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/webhooks/whatsapp", post(webhook::post_webhook))
        .route(
            "/v1/sessions/{session}/start",
            post(handlers::post_session_start),
        )
        .route("/v1/queue", get(handlers::get_queue))
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds to `host:port` and serves until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), CourierError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway server listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| CourierError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway server stopped");
    Ok(())
}
