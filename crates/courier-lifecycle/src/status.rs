// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway status vocabularies mapped onto [`InstanceStatus`].

use courier_core::InstanceStatus;

/// Maps a gateway session status (`WORKING`, `SCAN_QR_CODE`, ...) to an instance status.
///
/// Total: anything unrecognized is `Disconnected`.
pub fn map_provider_status(status: &str) -> InstanceStatus {
    match status.trim().to_ascii_uppercase().as_str() {
        "STARTING" | "SYNCING" => InstanceStatus::Connecting,
        "WORKING" | "RUNNING" => InstanceStatus::Connected,
        _ => InstanceStatus::Disconnected,
    }
}

/// Maps the `connection` field of a `connection.update` event.
///
/// Returns `None` for states that should leave the stored status alone.
pub fn map_connection_state(state: &str) -> Option<InstanceStatus> {
    match state.trim().to_ascii_lowercase().as_str() {
        "open" => Some(InstanceStatus::Connected),
        "close" => Some(InstanceStatus::Disconnected),
        "connecting" => Some(InstanceStatus::Connecting),
        _ => None,
    }
}
