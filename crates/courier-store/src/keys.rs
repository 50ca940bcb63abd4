// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key layout in the shared store.

/// Builds every key the session core reads or writes.
#[derive(Debug, Clone)]
pub struct StoreKeys {
    prefix: String,
}

impl StoreKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn key(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}:{suffix}", self.prefix)
        }
    }

    /// FIFO list of pending [`QueueEntry`](courier_core::QueueEntry) JSON.
    pub fn session_queue(&self) -> String {
        self.key("session_queue")
    }

    /// Hash of session name to start timestamp (ms) for in-flight starts.
    pub fn session_processing(&self) -> String {
        self.key("session_processing")
    }

    /// Counter of claimed start slots.
    pub fn session_slots(&self) -> String {
        self.key("session_slots")
    }

    /// Marker written by each drain, expiring after the debounce window.
    pub fn session_queue_last_drain(&self) -> String {
        self.key("session_queue_last_drain")
    }

    pub fn message_queue(&self, instance_id: &str, chat_id: &str) -> String {
        self.key(&format!("msg_queue:{instance_id}:{chat_id}"))
    }

    pub fn agent_status(&self, instance_id: &str, chat_id: &str) -> String {
        self.key(&format!("agent_status:{instance_id}:{chat_id}"))
    }

    pub fn message_seen(&self, instance_id: &str, message_id: &str) -> String {
        self.key(&format!("msg_seen:{instance_id}:{message_id}"))
    }

    pub fn qr_scan(&self, instance_id: &str, session: &str) -> String {
        self.key(&format!("qr_scan:{instance_id}:{session}"))
    }
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self::new("courier")
    }
}
