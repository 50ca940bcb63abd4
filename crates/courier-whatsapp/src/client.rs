// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared reqwest setup for the collaborator clients.

use std::time::Duration;

use courier_core::CourierError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Builds a client with a request timeout and optional auth header.
pub(crate) fn build_client(
    auth: Option<(HeaderName, String)>,
    timeout: Duration,
) -> Result<reqwest::Client, CourierError> {
    let mut headers = HeaderMap::new();
    if let Some((name, value)) = auth {
        let mut value = HeaderValue::from_str(&value)
            .map_err(|e| CourierError::Config(format!("invalid {name} header value: {e}")))?;
        value.set_sensitive(true);
        headers.insert(name, value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| CourierError::Internal(format!("failed to build HTTP client: {e}")))
}

/// Joins a base URL and a path without doubling the slash.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Reads an error body for logging, capped so a runaway page cannot flood the log.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > 512 {
        let mut cut = 512;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
