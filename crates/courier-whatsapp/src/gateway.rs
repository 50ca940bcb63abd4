// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-start RPC on the WhatsApp gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderName;
use serde::Serialize;
use tracing::debug;

use courier_config::model::GatewayConfig;
use courier_core::{AdapterType, CourierError, PluginAdapter, SessionStarter};

use crate::client::{build_client, error_body, join};

#[derive(Serialize)]
struct StartSessionBody<'a> {
    name: &'a str,
}

/// Client for `POST {base}/api/sessions/start`.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, CourierError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let auth = config
            .api_key
            .clone()
            .map(|key| (HeaderName::from_static("x-api-key"), key));
        Ok(Self {
            client: build_client(auth, timeout)?,
            base_url: config.base_url.clone(),
            timeout,
        })
    }

    fn request_error(&self, e: reqwest::Error) -> CourierError {
        if e.is_timeout() {
            return CourierError::Timeout {
                duration: self.timeout,
            };
        }
        CourierError::Gateway {
            message: format!("session start request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

#[async_trait]
impl PluginAdapter for GatewayClient {
    fn name(&self) -> &str {
        "whatsapp-gateway"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::SessionGateway
    }
}

#[async_trait]
impl SessionStarter for GatewayClient {
    async fn start_session(&self, session: &str) -> Result<(), CourierError> {
        let response = self
            .client
            .post(join(&self.base_url, "api/sessions/start"))
            .json(&StartSessionBody { name: session })
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        debug!(session, status = %status, "session start response");
        if status.is_success() {
            return Ok(());
        }
        let body = error_body(response).await;
        Err(CourierError::Gateway {
            message: format!("gateway returned {status} starting '{session}': {body}"),
            source: None,
        })
    }
}
