// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coalescing pass: buffer a message, wait for quiet, call the agent once.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use courier_core::{AgentInvoker, AgentRequest, InboundMessage};

use crate::coalescer::{CoalesceOutcome, MessageCoalescer};

/// What happened to an inbound message at the door.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    /// Buffered; a coalescing pass was started for this length.
    Buffered(usize),
    /// Same provider message id seen recently.
    Duplicate,
    /// The buffer write failed; a redelivery of the same id will be accepted.
    Failed,
}

/// Drives the coalescer and hands ready batches to the agent.
#[derive(Clone)]
pub struct CoalescingDispatcher {
    coalescer: MessageCoalescer,
    agent: Arc<dyn AgentInvoker>,
}

impl CoalescingDispatcher {
    pub fn new(coalescer: MessageCoalescer, agent: Arc<dyn AgentInvoker>) -> Self {
        Self { coalescer, agent }
    }

    pub fn coalescer(&self) -> &MessageCoalescer {
        &self.coalescer
    }

    /// Dedupes and buffers a message, then spawns a coalescing pass for it.
    pub async fn accept_message(
        &self,
        instance_id: &str,
        message: InboundMessage,
        raw_body: Value,
    ) -> Accepted {
        if let Some(id) = message.id.as_deref()
            && !self.coalescer.claim_message_id(instance_id, id).await
        {
            info!(instance_id, message_id = id, "duplicate message dropped");
            return Accepted::Duplicate;
        }

        let message_id = message.id.clone();
        let chat_id = message.chat_id.clone();
        let outcome = self
            .coalescer
            .enqueue_message(instance_id, &chat_id, message, raw_body)
            .await;
        if !outcome.success {
            if let Some(id) = message_id.as_deref() {
                self.coalescer.release_message_id(instance_id, id).await;
            }
            return Accepted::Failed;
        }

        self.spawn_pass(instance_id, &chat_id, outcome.queue_length);
        Accepted::Buffered(outcome.queue_length)
    }

    /// Runs [`run_pass`](Self::run_pass) in the background.
    pub fn spawn_pass(
        &self,
        instance_id: &str,
        chat_id: &str,
        initial_length: usize,
    ) -> JoinHandle<bool> {
        let dispatcher = self.clone();
        let instance_id = instance_id.to_string();
        let chat_id = chat_id.to_string();
        tokio::spawn(async move {
            dispatcher
                .run_pass(&instance_id, &chat_id, initial_length)
                .await
        })
    }

    /// One coalescing pass. Returns `true` if this pass invoked the agent.
    ///
    /// The busy lock is released whether the agent call succeeds or not.
    pub async fn run_pass(&self, instance_id: &str, chat_id: &str, initial_length: usize) -> bool {
        let CoalesceOutcome::Ready(batch) = self
            .coalescer
            .check_and_process_queue(instance_id, chat_id, initial_length)
            .await
        else {
            return false;
        };

        let message_count = batch.messages.len();
        metrics::counter!("courier_coalesced_batches_total").increment(1);
        metrics::counter!("courier_coalesced_messages_total").increment(message_count as u64);

        let request = AgentRequest {
            instance_id: instance_id.to_string(),
            chat_id: chat_id.to_string(),
            combined_content: batch.combined_content,
            first_message: batch.first_message,
            message_count,
        };
        match self.agent.invoke(request).await {
            Ok(()) => info!(instance_id, chat_id, message_count, "agent handled batch"),
            Err(e) => warn!(instance_id, chat_id, error = %e, "agent invocation failed"),
        }

        self.coalescer
            .mark_agent_completed(instance_id, chat_id, &batch.lock_token)
            .await;
        true
    }
}

impl std::fmt::Debug for CoalescingDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingDispatcher")
            .field("coalescer", &self.coalescer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use courier_config::model::CoalescerConfig;
    use courier_core::{AgentStatus, KvStore};
    use courier_store::{MemoryStore, StoreKeys};
    use courier_test_utils::{FlakyStore, MockAgent};
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;

    fn dispatcher(agent: Arc<MockAgent>) -> CoalescingDispatcher {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let coalescer =
            MessageCoalescer::new(store, StoreKeys::default(), &CoalescerConfig::default());
        CoalescingDispatcher::new(coalescer, agent)
    }

    fn text(id: Option<&str>, body: &str) -> InboundMessage {
        InboundMessage {
            id: id.map(str::to_string),
            chat_id: "5511999999999@c.us".into(),
            body: body.into(),
            sent_at_ms: None,
            from_me: false,
            has_media: false,
        }
    }

    async fn send(d: &CoalescingDispatcher, body: &str) {
        d.accept_message("inst-1", text(None, body), json!({ "body": body }))
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_messages_become_one_agent_call() {
        let agent = Arc::new(MockAgent::new());
        let d = dispatcher(agent.clone());

        send(&d, "Hi").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        send(&d, "how").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        send(&d, "are you").await;
        tokio::time::sleep(Duration::from_millis(3_500)).await;

        let requests = agent.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].combined_content, "Hi\nhow\nare you");
        assert_eq!(requests[0].message_count, 3);
        assert_eq!(requests[0].first_message.body, "Hi");
        assert_eq!(
            d.coalescer()
                .agent_status("inst-1", "5511999999999@c.us")
                .await
                .unwrap(),
            AgentStatus::Idle
        );
    }

    #[tokio::test(start_paused = true)]
    async fn late_message_restarts_the_quiet_window() {
        let agent = Arc::new(MockAgent::new());
        let d = dispatcher(agent.clone());

        send(&d, "Hi").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        send(&d, "how").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        send(&d, "are you").await;
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        send(&d, "doing?").await;

        // The third message's window has closed, but the fourth reset it.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(agent.requests().await.is_empty());

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let requests = agent.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].combined_content, "Hi\nhow\nare you\ndoing?");
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_ids_are_buffered_once() {
        let agent = Arc::new(MockAgent::new());
        let d = dispatcher(agent.clone());

        let first = d
            .accept_message("inst-1", text(Some("wamid.1"), "hello"), json!({}))
            .await;
        let second = d
            .accept_message("inst-1", text(Some("wamid.1"), "hello"), json!({}))
            .await;
        assert_eq!(first, Accepted::Buffered(1));
        assert_eq!(second, Accepted::Duplicate);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(agent.requests().await[0].combined_content, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_buffer_write_accepts_the_redelivery() {
        let agent = Arc::new(MockAgent::new());
        let store = Arc::new(FlakyStore::new());
        store.fail_pushes(1);
        let coalescer =
            MessageCoalescer::new(store, StoreKeys::default(), &CoalescerConfig::default());
        let d = CoalescingDispatcher::new(coalescer, agent.clone());

        let first = d
            .accept_message("inst-1", text(Some("wamid.7"), "hello"), json!({}))
            .await;
        assert_eq!(first, Accepted::Failed);

        let redelivered = d
            .accept_message("inst-1", text(Some("wamid.7"), "hello"), json!({}))
            .await;
        assert_eq!(redelivered, Accepted::Buffered(1));

        tokio::time::sleep(Duration::from_secs(4)).await;
        let requests = agent.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].combined_content, "hello");
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn agent_failure_still_releases_the_lock() {
        let agent = Arc::new(MockAgent::failing());
        let d = dispatcher(agent.clone());

        send(&d, "ping").await;
        tokio::time::sleep(Duration::from_secs(4)).await;

        assert_eq!(agent.requests().await.len(), 1);
        assert_eq!(
            d.coalescer()
                .agent_status("inst-1", "5511999999999@c.us")
                .await
                .unwrap(),
            AgentStatus::Idle
        );
        assert!(logs_contain("agent invocation failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn messages_during_agent_call_wait_for_the_next_pass() {
        let agent = Arc::new(MockAgent::new().with_delay(Duration::from_secs(10)));
        let d = dispatcher(agent.clone());

        send(&d, "first").await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        send(&d, "second").await;
        // Quiet window passes while the first call is still running.
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(agent.requests().await.len(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let pending = d
            .coalescer()
            .dequeue_all_messages("inst-1", "5511999999999@c.us")
            .await;
        assert_eq!(pending.messages.len(), 1);
        assert_eq!(pending.messages[0].message.body, "second");
    }
}
