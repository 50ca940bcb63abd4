// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP-level tests of the gateway router on the in-memory session core.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use courier_config::model::StartQueueConfig;
use courier_core::{InstanceStatus, KvStore};
use courier_gateway::{GatewayState, router};
use courier_lifecycle::SessionStartQueue;
use courier_store::StoreKeys;
use courier_test_utils::{FailingStore, TestHarness};

fn state(harness: &TestHarness) -> GatewayState {
    GatewayState {
        store: harness.kv(),
        events: harness.events.clone(),
        start_queue: harness.start_queue.clone(),
        dispatcher: harness.dispatcher.clone(),
        metrics: None,
    }
}

fn app(harness: &TestHarness) -> Router {
    router(state(harness))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn webhook(event: &str, payload: Value) -> Request<Body> {
    post_json(
        "/webhooks/whatsapp",
        json!({ "event": event, "session": "sales-bot", "payload": payload }),
    )
}

#[tokio::test]
async fn status_webhook_persists_and_acks() {
    let harness = TestHarness::builder()
        .with_instance("inst-1", "sales-bot")
        .build();
    let app = app(&harness);

    let (status, body) = send(
        &app,
        webhook("session.status", json!({ "status": "STARTING" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "handled": "session.status" }));
    assert_eq!(
        harness.repository.status_of("inst-1").await,
        Some(InstanceStatus::Connecting)
    );
}

#[tokio::test]
async fn fifth_qr_webhook_queues_delete() {
    let harness = TestHarness::builder()
        .with_instance("inst-1", "sales-bot")
        .build();
    let app = app(&harness);

    for _ in 0..4 {
        send(&app, webhook("qrcode.updated", json!({ "qr": "2@abc" }))).await;
    }
    assert!(harness.deleter.deleted().await.is_empty());

    let (status, body) = send(&app, webhook("qrcode.updated", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["handled"], "qr");
    assert_eq!(harness.deleter.deleted().await, ["inst-1"]);
}

#[tokio::test]
async fn malformed_and_unknown_webhooks_still_ack() {
    let harness = TestHarness::builder().build();
    let app = app(&harness);

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/whatsapp")
        .body(Body::from("not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "handled": "invalid" }));

    let (status, body) = send(&app, webhook("ready", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["handled"], "ready");
    assert!(harness.repository.updates().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn message_webhooks_are_coalesced() {
    let harness = TestHarness::builder()
        .with_instance("inst-1", "sales-bot")
        .build();
    let app = app(&harness);

    for (id, body) in [("m1", "Hi"), ("m2", "how"), ("m3", "are you")] {
        let (status, ack) = send(
            &app,
            webhook(
                "message",
                json!({ "id": id, "from": "5511@c.us", "body": body, "fromMe": false }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["handled"], "message");
        // Gateways also deliver every message as `message.any`.
        send(
            &app,
            webhook(
                "message.any",
                json!({ "id": id, "from": "5511@c.us", "body": body }),
            ),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    tokio::time::sleep(Duration::from_secs(4)).await;

    let requests = harness.agent.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].instance_id, "inst-1");
    assert_eq!(requests[0].combined_content, "Hi\nhow\nare you");
    assert_eq!(requests[0].message_count, 3);
}

#[tokio::test(start_paused = true)]
async fn own_messages_are_not_buffered() {
    let harness = TestHarness::builder()
        .with_instance("inst-1", "sales-bot")
        .build();
    let app = app(&harness);

    send(
        &app,
        webhook(
            "message",
            json!({ "from": "5511@c.us", "body": "our reply", "fromMe": true }),
        ),
    )
    .await;
    tokio::time::sleep(Duration::from_secs(4)).await;

    assert!(harness.agent.requests().await.is_empty());
    let keys = StoreKeys::default();
    assert_eq!(
        harness
            .kv()
            .list_len(&keys.message_queue("inst-1", "5511@c.us"))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn session_start_is_queued_and_run() {
    let harness = TestHarness::builder().build();
    let app = app(&harness);

    let (status, body) = send(
        &app,
        post_json("/v1/sessions/sales-bot/start", json!({ "instance_id": "inst-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "session": "sales-bot", "position": 1 }));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.starter.started().await, ["sales-bot"]);

    let (status, body) = send(&app, get("/v1/queue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["depth"], 0);
    assert_eq!(body["processing_count"], 0);
}

#[tokio::test]
async fn session_start_body_is_optional_but_validated() {
    let harness = TestHarness::builder().build();
    let app = app(&harness);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/sessions/sales-bot/start")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(
        &app,
        post_json("/v1/sessions/sales-bot/start", json!({ "instance": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid body"));
}

#[tokio::test]
async fn store_outage_surfaces_on_operator_endpoints() {
    let harness = TestHarness::builder().build();
    let failing: Arc<dyn KvStore> = Arc::new(FailingStore);
    let mut gateway = state(&harness);
    gateway.store = failing.clone();
    gateway.start_queue = SessionStartQueue::new(
        failing,
        StoreKeys::default(),
        harness.starter.clone(),
        &StartQueueConfig::default(),
    );
    let app = router(gateway);

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");

    let (status, _) = send(
        &app,
        post_json("/v1/sessions/sales-bot/start", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(&app, get("/v1/queue")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_ok_and_metrics_disabled() {
    let harness = TestHarness::builder().build();
    let app = app(&harness);

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
