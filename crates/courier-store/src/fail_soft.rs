// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Degrade store failures to "log and continue".
//!
//! Webhook handlers must keep answering the provider while the shared store
//! is down, so most store calls treat an error as "nothing there".

use courier_core::CourierError;
use tracing::warn;

pub trait LogOnError<T> {
    /// Returns the value, or logs the error and returns `default`.
    fn or_log(self, op: &'static str, default: T) -> T;
}

impl<T> LogOnError<T> for Result<T, CourierError> {
    fn or_log(self, op: &'static str, default: T) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                warn!(op, error = %e, "store operation failed, continuing");
                default
            }
        }
    }
}
