// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message buffer, stability check, and the agent busy lock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use courier_config::model::CoalescerConfig;
use courier_core::{AgentStatus, CourierError, InboundMessage, KvStore, MessageQueueItem};
use courier_store::{LogOnError, StoreKeys};

/// Result of buffering one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub success: bool,
    /// Buffer length after the append; zero when the append failed.
    pub queue_length: usize,
}

/// Result of draining a chat buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DequeueOutcome {
    /// Drained items in ascending timestamp order.
    pub messages: Vec<MessageQueueItem>,
    pub success: bool,
}

/// A drained, merged batch ready for the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatBatch {
    pub messages: Vec<MessageQueueItem>,
    /// Message bodies in timestamp order, newline separated.
    pub combined_content: String,
    pub first_message: InboundMessage,
    /// Value this pass wrote into the busy lock; releasing requires it.
    pub lock_token: String,
}

/// Result of one coalescing check.
///
/// Only [`CoalesceOutcome::Ready`] holds the busy lock; the caller must
/// release it with [`MessageCoalescer::mark_agent_completed`].
#[derive(Debug, Clone, PartialEq)]
pub enum CoalesceOutcome {
    /// More messages arrived during the quiet window; a later pass will handle them.
    Unstable,
    /// Another pass holds the busy lock for this chat.
    Busy,
    /// The lock was taken but the buffer was already empty.
    Empty,
    /// The shared store failed.
    Unavailable,
    Ready(ChatBatch),
}

impl CoalesceOutcome {
    pub fn should_process(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Per-(instance, chat) message buffer with a leased busy lock.
#[derive(Clone)]
pub struct MessageCoalescer {
    store: Arc<dyn KvStore>,
    keys: StoreKeys,
    stability_window: Duration,
    buffer_ttl: Duration,
    lock_lease: Duration,
    dedupe_ttl: Duration,
}

impl MessageCoalescer {
    pub fn new(store: Arc<dyn KvStore>, keys: StoreKeys, config: &CoalescerConfig) -> Self {
        Self {
            store,
            keys,
            stability_window: config.stability_window(),
            buffer_ttl: config.buffer_ttl(),
            lock_lease: config.lock_lease(),
            dedupe_ttl: config.dedupe_ttl(),
        }
    }

    /// Records a provider message id. Returns `false` if it was already seen.
    ///
    /// A store failure counts as unseen so that no message is dropped.
    pub async fn claim_message_id(&self, instance_id: &str, message_id: &str) -> bool {
        let key = self.keys.message_seen(instance_id, message_id);
        self.store
            .set_nx(&key, "1", Some(self.dedupe_ttl))
            .await
            .or_log("message_seen.set_nx", true)
    }

    /// Forgets a claimed message id so a redelivery is accepted again.
    pub async fn release_message_id(&self, instance_id: &str, message_id: &str) {
        let key = self.keys.message_seen(instance_id, message_id);
        self.store.delete(&key).await.or_log("message_seen.delete", false);
    }

    /// Appends a message to the chat buffer and refreshes its TTL.
    pub async fn enqueue_message(
        &self,
        instance_id: &str,
        chat_id: &str,
        message: InboundMessage,
        raw_body: Value,
    ) -> EnqueueOutcome {
        match self.try_enqueue(instance_id, chat_id, message, raw_body).await {
            Ok(queue_length) => {
                debug!(instance_id, chat_id, queue_length, "message buffered");
                EnqueueOutcome {
                    success: true,
                    queue_length,
                }
            }
            Err(e) => {
                warn!(instance_id, chat_id, error = %e, "failed to buffer message");
                EnqueueOutcome {
                    success: false,
                    queue_length: 0,
                }
            }
        }
    }

    async fn try_enqueue(
        &self,
        instance_id: &str,
        chat_id: &str,
        message: InboundMessage,
        raw_body: Value,
    ) -> Result<usize, CourierError> {
        let key = self.keys.message_queue(instance_id, chat_id);
        let item = MessageQueueItem {
            timestamp: message.sent_at_ms.unwrap_or_else(now_ms),
            message,
            raw_body,
        };
        let len = self
            .store
            .list_push(&key, &serde_json::to_string(&item)?)
            .await?;
        self.store
            .expire(&key, self.buffer_ttl)
            .await
            .or_log("message_queue.expire", false);
        Ok(len)
    }

    /// Drains the whole chat buffer, oldest first.
    ///
    /// Items appended while the drain runs stay in the buffer.
    pub async fn dequeue_all_messages(&self, instance_id: &str, chat_id: &str) -> DequeueOutcome {
        let key = self.keys.message_queue(instance_id, chat_id);

        let raw = match self.store.list_range(&key, 0, -1).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(instance_id, chat_id, error = %e, "failed to read message buffer");
                return DequeueOutcome {
                    messages: Vec::new(),
                    success: false,
                };
            }
        };
        if raw.is_empty() {
            return DequeueOutcome {
                messages: Vec::new(),
                success: true,
            };
        }

        let drained = isize::try_from(raw.len()).unwrap_or(isize::MAX);
        if let Err(e) = self.store.list_trim(&key, drained, -1).await {
            warn!(instance_id, chat_id, error = %e, "failed to clear message buffer");
            return DequeueOutcome {
                messages: Vec::new(),
                success: false,
            };
        }

        let mut messages: Vec<MessageQueueItem> = raw
            .iter()
            .filter_map(|item| match serde_json::from_str(item) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(instance_id, chat_id, error = %e, "skipping malformed buffered message");
                    None
                }
            })
            .collect();
        messages.sort_by_key(|item| item.timestamp);

        DequeueOutcome {
            messages,
            success: true,
        }
    }

    /// Waits out the quiet window, then checks nothing new arrived.
    pub async fn is_queue_stable(
        &self,
        instance_id: &str,
        chat_id: &str,
        initial_length: usize,
    ) -> bool {
        tokio::time::sleep(self.stability_window).await;
        let key = self.keys.message_queue(instance_id, chat_id);
        match self.store.list_len(&key).await {
            Ok(len) => len == initial_length,
            Err(e) => {
                warn!(instance_id, chat_id, error = %e, "failed to read buffer length");
                false
            }
        }
    }

    /// Runs one coalescing check for a chat.
    ///
    /// Call once after every [`enqueue_message`](Self::enqueue_message) with
    /// the length it returned.
    pub async fn check_and_process_queue(
        &self,
        instance_id: &str,
        chat_id: &str,
        initial_length: usize,
    ) -> CoalesceOutcome {
        if !self.is_queue_stable(instance_id, chat_id, initial_length).await {
            debug!(instance_id, chat_id, "buffer still changing, yielding");
            return CoalesceOutcome::Unstable;
        }

        let lock_key = self.keys.agent_status(instance_id, chat_id);
        let lock_token = format!("{}:{}", AgentStatus::Processing, Uuid::new_v4());
        match self
            .store
            .set_nx(&lock_key, &lock_token, Some(self.lock_lease))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(instance_id, chat_id, "agent busy for chat, yielding");
                return CoalesceOutcome::Busy;
            }
            Err(e) => {
                warn!(instance_id, chat_id, error = %e, "failed to claim agent lock");
                return CoalesceOutcome::Unavailable;
            }
        }

        let DequeueOutcome { messages, success } =
            self.dequeue_all_messages(instance_id, chat_id).await;
        let Some(first) = messages.first() else {
            self.mark_agent_completed(instance_id, chat_id, &lock_token).await;
            return if success {
                CoalesceOutcome::Empty
            } else {
                CoalesceOutcome::Unavailable
            };
        };
        let first_message = first.message.clone();

        let combined_content = messages
            .iter()
            .map(|item| item.message.body.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            instance_id,
            chat_id,
            message_count = messages.len(),
            "buffer coalesced"
        );
        CoalesceOutcome::Ready(ChatBatch {
            messages,
            combined_content,
            first_message,
            lock_token,
        })
    }

    /// Releases the busy lock for a chat if `lock_token` still holds it.
    ///
    /// A pass that outlived its lease finds the lock expired or owned by a
    /// newer pass, and leaves it alone.
    pub async fn mark_agent_completed(&self, instance_id: &str, chat_id: &str, lock_token: &str) {
        let key = self.keys.agent_status(instance_id, chat_id);
        let released = self
            .store
            .delete_if_eq(&key, lock_token)
            .await
            .or_log("agent_status.release", true);
        if !released {
            warn!(instance_id, chat_id, "busy lock lease ran out before the pass finished");
        }
    }

    pub async fn agent_status(
        &self,
        instance_id: &str,
        chat_id: &str,
    ) -> Result<AgentStatus, CourierError> {
        let key = self.keys.agent_status(instance_id, chat_id);
        Ok(match self.store.get(&key).await? {
            Some(_) => AgentStatus::Processing,
            None => AgentStatus::Idle,
        })
    }
}

impl std::fmt::Debug for MessageCoalescer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCoalescer")
            .field("stability_window", &self.stability_window)
            .field("lock_lease", &self.lock_lease)
            .finish_non_exhaustive()
    }
}
