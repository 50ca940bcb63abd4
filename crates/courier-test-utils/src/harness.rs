// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end tests.
//!
//! `TestHarness` assembles the complete session core (QR guard, start queue,
//! event handler, coalescing dispatcher) on a [`MemoryStore`] with recording
//! mocks for every outside collaborator.

use std::sync::Arc;
use std::time::Duration;

use courier_coalescer::{CoalescingDispatcher, MessageCoalescer};
use courier_config::model::CourierConfig;
use courier_core::KvStore;
use courier_lifecycle::{QrScanGuard, SessionEventHandler, SessionStartQueue};
use courier_store::{MemoryStore, StoreKeys};

use crate::mocks::{MockAgent, MockInstanceRepository, MockSessionDeleter, MockSessionStarter};

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    config: CourierConfig,
    repository: MockInstanceRepository,
    starter: MockSessionStarter,
    agent: MockAgent,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: CourierConfig::default(),
            repository: MockInstanceRepository::new(),
            starter: MockSessionStarter::new(),
            agent: MockAgent::new(),
        }
    }

    /// Uses this configuration instead of the defaults.
    pub fn with_config(mut self, config: CourierConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers an instance with its gateway session.
    pub fn with_instance(mut self, instance_id: &str, session: &str) -> Self {
        self.repository = self.repository.with_instance(instance_id, session);
        self
    }

    /// Slows every session start down.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.starter = self.starter.with_delay(delay);
        self
    }

    /// Slows every agent call down.
    pub fn with_agent_delay(mut self, delay: Duration) -> Self {
        self.agent = self.agent.with_delay(delay);
        self
    }

    pub fn build(self) -> TestHarness {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn KvStore> = store.clone();
        let keys = StoreKeys::new(self.config.store.key_prefix.clone());

        let repository = Arc::new(self.repository);
        let starter = Arc::new(self.starter);
        let deleter = Arc::new(MockSessionDeleter::new());
        let agent = Arc::new(self.agent);

        let qr_guard = QrScanGuard::new(
            shared.clone(),
            keys.clone(),
            deleter.clone(),
            &self.config.qr_guard,
        );
        let start_queue = SessionStartQueue::new(
            shared.clone(),
            keys.clone(),
            starter.clone(),
            &self.config.start_queue,
        );
        let events = SessionEventHandler::new(repository.clone(), qr_guard);
        let coalescer = MessageCoalescer::new(shared, keys.clone(), &self.config.coalescer);
        let dispatcher = CoalescingDispatcher::new(coalescer, agent.clone());

        TestHarness {
            config: self.config,
            keys,
            store,
            repository,
            starter,
            deleter,
            agent,
            start_queue,
            events,
            dispatcher,
        }
    }
}

/// The full session core wired onto mocks.
pub struct TestHarness {
    pub config: CourierConfig,
    pub keys: StoreKeys,
    pub store: Arc<MemoryStore>,
    pub repository: Arc<MockInstanceRepository>,
    pub starter: Arc<MockSessionStarter>,
    pub deleter: Arc<MockSessionDeleter>,
    pub agent: Arc<MockAgent>,
    pub start_queue: SessionStartQueue,
    pub events: SessionEventHandler,
    pub dispatcher: CoalescingDispatcher,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The shared store as the components see it.
    pub fn kv(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }
}
