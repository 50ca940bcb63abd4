// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier service.

use thiserror::Error;

/// The primary error type used across all Courier traits and components.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Shared key-value store errors (connection loss, wrong type, timeouts).
    #[error("store error: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Relational instance store errors.
    #[error("repository error: {source}")]
    Repository {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// WhatsApp gateway RPC errors (session start failed, bad response).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Background job runner errors (delete-instance enqueue failed).
    #[error("job runner error: {message}")]
    Jobs {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Downstream agent invocation errors.
    #[error("agent error: {message}")]
    Agent {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON encoding or decoding of stored payloads failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Builds a [`CourierError::Store`] from a plain message.
    pub fn store(message: impl Into<String>) -> Self {
        let message: String = message.into();
        CourierError::Store {
            source: message.into(),
        }
    }
}
