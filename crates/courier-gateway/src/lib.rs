// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface of the Courier session core.
//!
//! Receives WhatsApp gateway webhooks, exposes the session-start queue to
//! operators, and serves health and Prometheus endpoints.

pub mod handlers;
pub mod server;
pub mod webhook;

pub use server::{GatewayState, ServerConfig, router, start_server};
