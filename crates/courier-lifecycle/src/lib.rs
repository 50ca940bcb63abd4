// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle for WhatsApp gateway instances.
//!
//! - [`status`] translates gateway vocabularies into [`InstanceStatus`](courier_core::InstanceStatus).
//! - [`qr_guard`] detects an instance stuck re-issuing QR codes and queues its deletion.
//! - [`start_queue`] starts gateway sessions with a shared concurrency ceiling.
//! - [`events`] classifies session webhooks and applies their status changes.

pub mod events;
pub mod qr_guard;
pub mod start_queue;
pub mod status;

pub use events::{EventOutcome, SessionEvent, SessionEventHandler, StatusChange};
pub use qr_guard::{QrScanGuard, ScanOutcome};
pub use start_queue::{DrainOutcome, QueueSnapshot, SessionStartQueue};
pub use status::{map_connection_state, map_provider_status};
