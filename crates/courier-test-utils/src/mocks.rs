// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording mocks for the session core's collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use courier_core::{
    AdapterType, AgentInvoker, AgentRequest, CourierError, InstanceRepository, InstanceStatus,
    JobId, PluginAdapter, SessionDeleter, SessionStarter,
};

#[derive(Default)]
struct StarterState {
    started: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Session starter that records calls and can be slowed down or made to fail.
#[derive(Clone, Default)]
pub struct MockSessionStarter {
    state: Arc<Mutex<StarterState>>,
    delay: Duration,
    failing: HashSet<String>,
}

impl MockSessionStarter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each start takes this long (in tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Starting `session` returns an error.
    pub fn failing_for(mut self, session: &str) -> Self {
        self.failing.insert(session.to_string());
        self
    }

    /// Every session a start was attempted for, in call order.
    pub async fn started(&self) -> Vec<String> {
        self.state.lock().await.started.clone()
    }

    /// Highest number of starts that were running at once.
    pub async fn max_in_flight(&self) -> usize {
        self.state.lock().await.max_in_flight
    }
}

#[async_trait]
impl PluginAdapter for MockSessionStarter {
    fn name(&self) -> &str {
        "mock-starter"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::SessionGateway
    }
}

#[async_trait]
impl SessionStarter for MockSessionStarter {
    async fn start_session(&self, session: &str) -> Result<(), CourierError> {
        {
            let mut state = self.state.lock().await;
            state.started.push(session.to_string());
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.state.lock().await.in_flight -= 1;

        if self.failing.contains(session) {
            return Err(CourierError::Gateway {
                message: format!("mock refused to start '{session}'"),
                source: None,
            });
        }
        Ok(())
    }
}

/// Delete-job runner that records instance ids.
#[derive(Clone, Default)]
pub struct MockSessionDeleter {
    deleted: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl MockSessionDeleter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A deleter whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn deleted(&self) -> Vec<String> {
        self.deleted.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockSessionDeleter {
    fn name(&self) -> &str {
        "mock-deleter"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::JobRunner
    }
}

#[async_trait]
impl SessionDeleter for MockSessionDeleter {
    async fn queue_session_delete(&self, instance_id: &str) -> Result<JobId, CourierError> {
        if self.fail {
            return Err(CourierError::Jobs {
                message: "mock job runner unavailable".into(),
                source: None,
            });
        }
        let mut deleted = self.deleted.lock().await;
        deleted.push(instance_id.to_string());
        Ok(JobId(format!("job-{}", deleted.len())))
    }
}

#[derive(Default)]
struct RepositoryState {
    statuses: HashMap<String, InstanceStatus>,
    updates: Vec<(String, InstanceStatus, DateTime<Utc>)>,
}

/// In-memory instance repository.
#[derive(Clone, Default)]
pub struct MockInstanceRepository {
    sessions: HashMap<String, String>,
    state: Arc<Mutex<RepositoryState>>,
    fail_writes: bool,
}

impl MockInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance and the gateway session that belongs to it.
    pub fn with_instance(mut self, instance_id: &str, session: &str) -> Self {
        self.sessions
            .insert(session.to_string(), instance_id.to_string());
        self
    }

    /// Status updates fail from now on.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub async fn status_of(&self, instance_id: &str) -> Option<InstanceStatus> {
        self.state.lock().await.statuses.get(instance_id).copied()
    }

    /// Every successful status write, in order.
    pub async fn updates(&self) -> Vec<(String, InstanceStatus)> {
        self.state
            .lock()
            .await
            .updates
            .iter()
            .map(|(id, status, _)| (id.clone(), *status))
            .collect()
    }
}

#[async_trait]
impl PluginAdapter for MockInstanceRepository {
    fn name(&self) -> &str {
        "mock-repository"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Repository
    }
}

#[async_trait]
impl InstanceRepository for MockInstanceRepository {
    async fn instance_for_session(&self, session: &str) -> Result<Option<String>, CourierError> {
        Ok(self.sessions.get(session).cloned())
    }

    async fn update_instance_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), CourierError> {
        if self.fail_writes {
            return Err(CourierError::Repository {
                source: Box::new(std::io::Error::other("database is locked")),
            });
        }
        let mut state = self.state.lock().await;
        state.statuses.insert(instance_id.to_string(), status);
        state
            .updates
            .push((instance_id.to_string(), status, updated_at));
        Ok(())
    }
}

/// Agent that records every request it receives.
#[derive(Clone, Default)]
pub struct MockAgent {
    requests: Arc<Mutex<Vec<AgentRequest>>>,
    delay: Duration,
    fail: bool,
}

impl MockAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// An agent that records the request and then fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Each invocation takes this long (in tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Requests received so far, recorded when the call begins.
    pub async fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockAgent {
    fn name(&self) -> &str {
        "mock-agent"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Agent
    }
}

#[async_trait]
impl AgentInvoker for MockAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<(), CourierError> {
        self.requests.lock().await.push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(CourierError::Agent {
                message: "mock agent failed".into(),
                source: None,
            });
        }
        Ok(())
    }
}
