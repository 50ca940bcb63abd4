// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delete-instance action on the background job runner.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName};
use serde::{Deserialize, Serialize};
use tracing::debug;

use courier_config::model::JobsConfig;
use courier_core::{AdapterType, CourierError, JobId, PluginAdapter, SessionDeleter};

use crate::client::{build_client, error_body, join};

const DELETE_JOB_KIND: &str = "instance.delete";

#[derive(Serialize)]
struct JobRequest<'a> {
    kind: &'a str,
    instance_id: &'a str,
}

#[derive(Deserialize)]
struct JobResponse {
    id: String,
}

/// Client for `POST {base}/jobs`.
#[derive(Debug, Clone)]
pub struct JobRunnerClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl JobRunnerClient {
    pub fn new(config: &JobsConfig) -> Result<Self, CourierError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let auth: Option<(HeaderName, String)> = config
            .api_key
            .as_ref()
            .map(|key| (AUTHORIZATION, format!("Bearer {key}")));
        Ok(Self {
            client: build_client(auth, timeout)?,
            base_url: config.base_url.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl PluginAdapter for JobRunnerClient {
    fn name(&self) -> &str {
        "job-runner"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::JobRunner
    }
}

#[async_trait]
impl SessionDeleter for JobRunnerClient {
    async fn queue_session_delete(&self, instance_id: &str) -> Result<JobId, CourierError> {
        let response = self
            .client
            .post(join(&self.base_url, "jobs"))
            .json(&JobRequest {
                kind: DELETE_JOB_KIND,
                instance_id,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CourierError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    CourierError::Jobs {
                        message: format!("delete job request failed: {e}"),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(CourierError::Jobs {
                message: format!("job runner returned {status}: {body}"),
                source: None,
            });
        }

        let job: JobResponse = response.json().await.map_err(|e| CourierError::Jobs {
            message: format!("unreadable job runner response: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(instance_id, job_id = %job.id, "delete job accepted");
        Ok(JobId(job.id))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(base_url: String, api_key: Option<&str>) -> JobsConfig {
        JobsConfig {
            base_url,
            api_key: api_key.map(str::to_string),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn enqueues_delete_and_returns_job_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobs"))
            .and(header("authorization", "Bearer jobs-secret"))
            .and(body_json(
                serde_json::json!({"kind": "instance.delete", "instance_id": "inst-9"}),
            ))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({"id": "job-42"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = JobRunnerClient::new(&config(server.uri(), Some("jobs-secret"))).unwrap();
        let job = client.queue_session_delete("inst-9").await.unwrap();
        assert_eq!(job, JobId("job-42".into()));
    }

    #[tokio::test]
    async fn missing_job_id_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = JobRunnerClient::new(&config(server.uri(), None)).unwrap();
        let err = client.queue_session_delete("inst-9").await.unwrap_err();
        assert!(err.to_string().contains("unreadable job runner response"));
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = JobRunnerClient::new(&config(server.uri(), None)).unwrap();
        let err = client.queue_session_delete("inst-9").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
