// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downstream agent endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use tracing::debug;

use courier_config::model::AgentConfig;
use courier_core::{AdapterType, AgentInvoker, AgentRequest, CourierError, PluginAdapter};

use crate::client::{build_client, error_body};

/// Posts each coalesced [`AgentRequest`] as JSON to the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpAgent {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpAgent {
    pub fn new(config: &AgentConfig) -> Result<Self, CourierError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let auth = config
            .api_key
            .as_ref()
            .map(|key| (AUTHORIZATION, format!("Bearer {key}")));
        Ok(Self {
            client: build_client(auth, timeout)?,
            endpoint: config.endpoint.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl PluginAdapter for HttpAgent {
    fn name(&self) -> &str {
        "http-agent"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Agent
    }
}

#[async_trait]
impl AgentInvoker for HttpAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<(), CourierError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CourierError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    CourierError::Agent {
                        message: format!("agent request failed: {e}"),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        debug!(
            instance_id = %request.instance_id,
            chat_id = %request.chat_id,
            status = %status,
            "agent responded"
        );
        if status.is_success() {
            return Ok(());
        }
        let body = error_body(response).await;
        Err(CourierError::Agent {
            message: format!("agent returned {status}: {body}"),
            source: None,
        })
    }
}
