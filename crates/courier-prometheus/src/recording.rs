// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions and gateway-side recording helpers.
//!
//! The lifecycle and coalescer crates record their own counters through the
//! facade; the names are described here so they carry HELP text.

use metrics::{describe_counter, describe_gauge};

/// Registers every Courier metric description.
///
/// Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "courier_webhooks_total",
        "Gateway webhooks received, by event kind"
    );
    describe_counter!(
        "courier_session_starts_total",
        "Session start attempts, by outcome"
    );
    describe_counter!(
        "courier_qr_deletes_total",
        "Instances queued for deletion after repeated QR codes"
    );
    describe_counter!(
        "courier_coalesced_batches_total",
        "Coalesced batches handed to the agent"
    );
    describe_counter!(
        "courier_coalesced_messages_total",
        "Messages delivered to the agent inside coalesced batches"
    );
    describe_gauge!(
        "courier_start_queue_depth",
        "Session start requests waiting for a slot"
    );
    describe_gauge!("courier_memory_heap_bytes", "Allocated heap bytes");
    describe_gauge!("courier_memory_resident_bytes", "Resident memory bytes");
}

/// Counts one received webhook.
pub fn record_webhook(kind: &'static str) {
    metrics::counter!("courier_webhooks_total", "kind" => kind).increment(1);
}

pub fn set_memory_heap(bytes: f64) {
    metrics::gauge!("courier_memory_heap_bytes").set(bytes);
}

pub fn set_memory_resident(bytes: f64) {
    metrics::gauge!("courier_memory_resident_bytes").set(bytes);
}
