// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-concurrency session starts.
//!
//! Start requests are appended to a FIFO list in the shared store and drained
//! by whichever process triggers a drain. Concurrency is capped by an atomic
//! slot counter, so drains running in different processes never admit more
//! than `max_concurrent_starts` sessions between them.
//!
//! Store layout:
//! - `session_queue`: list of [`QueueEntry`] JSON, head is next.
//! - `session_processing`: hash of session name to admission time (ms).
//! - `session_slots`: number of occupied slots, leased.
//! - `session_queue_last_drain`: debounce marker, expires after the window.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use courier_config::model::StartQueueConfig;
use courier_core::{CourierError, KvStore, QueueEntry, SessionStarter};
use courier_store::{LogOnError, StoreKeys};

/// What a single drain attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another drain ran within the debounce window.
    Debounced,
    /// Every slot was taken; nothing was admitted.
    Saturated,
    /// This many entries were admitted (zero when the queue was empty).
    Admitted(usize),
    /// The shared store failed; the queue is left as it was.
    Unavailable,
}

/// Point-in-time view of the queue, for the operator API.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueSnapshot {
    pub queued: Vec<QueueEntry>,
    /// Session name to admission time in milliseconds since the epoch.
    pub processing: BTreeMap<String, i64>,
}

struct Inner {
    store: Arc<dyn KvStore>,
    keys: StoreKeys,
    starter: Arc<dyn SessionStarter>,
    max_concurrent: i64,
    drain_debounce: Duration,
    follow_up_delay: Duration,
    slot_lease: Duration,
}

/// FIFO session-start queue with a shared concurrency ceiling.
///
/// Cheap to clone; clones share the same collaborators.
#[derive(Clone)]
pub struct SessionStartQueue {
    inner: Arc<Inner>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl SessionStartQueue {
    pub fn new(
        store: Arc<dyn KvStore>,
        keys: StoreKeys,
        starter: Arc<dyn SessionStarter>,
        config: &StartQueueConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                keys,
                starter,
                max_concurrent: i64::try_from(config.max_concurrent_starts.max(1))
                    .unwrap_or(i64::MAX),
                drain_debounce: config.drain_debounce(),
                follow_up_delay: config.follow_up_delay(),
                slot_lease: config.slot_lease(),
            }),
        }
    }

    /// Appends a start request and kicks off a drain in the background.
    ///
    /// Returns the queue length after the append, the caller's approximate position.
    pub async fn queue_session_start(
        &self,
        session: &str,
        instance_id: Option<&str>,
    ) -> Result<usize, CourierError> {
        let entry = QueueEntry {
            session: session.to_string(),
            instance_id: instance_id.map(str::to_string),
        };
        let payload = serde_json::to_string(&entry)?;
        let position = self
            .inner
            .store
            .list_push(&self.inner.keys.session_queue(), &payload)
            .await?;

        metrics::gauge!("courier_start_queue_depth").set(position as f64);
        info!(session, position, "session start queued");

        tokio::spawn(self.clone().drain_with_retry());
        Ok(position)
    }

    /// Runs one drain, and if it was debounced, one more after the window.
    fn drain_with_retry(self) -> BoxFuture<'static, ()> {
        async move {
            if self.process_queue().await == DrainOutcome::Debounced {
                tokio::time::sleep(self.inner.drain_debounce).await;
                self.process_queue().await;
            }
        }
        .boxed()
    }

    /// Admits queued entries into free slots and starts them in the background.
    ///
    /// Safe to call redundantly from any number of processes.
    pub async fn process_queue(&self) -> DrainOutcome {
        let inner = &self.inner;
        let now = now_ms();

        match inner
            .store
            .set_nx(
                &inner.keys.session_queue_last_drain(),
                &now.to_string(),
                Some(inner.drain_debounce),
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!("drain skipped, another drain ran recently");
                return DrainOutcome::Debounced;
            }
            Err(e) => {
                warn!(error = %e, "drain aborted, store unavailable");
                return DrainOutcome::Unavailable;
            }
        }

        self.reap_stale(now).await;

        let mut admitted = 0;
        loop {
            match self.acquire_slot().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!(error = %e, "slot acquisition failed");
                    break;
                }
            }

            let raw = match inner
                .store
                .list_pop_front(&inner.keys.session_queue())
                .await
            {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    self.give_back_slot().await;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "failed to pop session queue");
                    self.give_back_slot().await;
                    break;
                }
            };

            let entry: QueueEntry = match serde_json::from_str(&raw) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, payload = %raw, "dropping malformed queue entry");
                    self.give_back_slot().await;
                    continue;
                }
            };

            let registered = match inner
                .store
                .hash_set(
                    &inner.keys.session_processing(),
                    &entry.session,
                    &now.to_string(),
                )
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    warn!(session = %entry.session, error = %e, "failed to register processing session");
                    false
                }
            };

            admitted += 1;
            info!(session = %entry.session, "session start admitted");
            tokio::spawn(self.clone().start_session_async(entry, registered));
        }

        let depth = inner
            .store
            .list_len(&inner.keys.session_queue())
            .await
            .or_log("session_queue.len", 0);
        metrics::gauge!("courier_start_queue_depth").set(depth as f64);

        if admitted == 0 && depth > 0 {
            debug!(depth, "all start slots busy");
            DrainOutcome::Saturated
        } else {
            DrainOutcome::Admitted(admitted)
        }
    }

    /// Takes one slot if the ceiling allows it.
    ///
    /// The counter's lease is renewed only on admission, so a counter nobody
    /// can admit against lapses on its own.
    async fn acquire_slot(&self) -> Result<bool, CourierError> {
        let inner = &self.inner;
        let slots_key = inner.keys.session_slots();
        let taken = inner.store.incr_by(&slots_key, 1).await?;

        if taken > inner.max_concurrent {
            self.give_back_slot().await;
            return Ok(false);
        }
        inner
            .store
            .expire(&slots_key, inner.slot_lease)
            .await
            .or_log("session_slots.expire", false);
        Ok(true)
    }

    async fn give_back_slot(&self) {
        let slots_key = self.inner.keys.session_slots();
        match self.inner.store.incr_by(&slots_key, -1).await {
            // The counter lapsed while slots were held; pull it back to zero.
            Ok(remaining) if remaining < 0 => {
                self.inner
                    .store
                    .incr_by(&slots_key, -remaining)
                    .await
                    .or_log("session_slots.clamp", 0);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to release start slot"),
        }
    }

    /// Removes a session from the processing set, releasing its slot if it was there.
    async fn release(&self, session: &str) {
        let removed = self
            .inner
            .store
            .hash_delete(&self.inner.keys.session_processing(), session)
            .await
            .or_log("session_processing.delete", false);
        if removed {
            self.give_back_slot().await;
        }
    }

    /// Reclaims slots held by starts older than the lease (crashed processes),
    /// then pulls the slot counter back down to the number of registered starts.
    async fn reap_stale(&self, now: i64) {
        let processing = self
            .inner
            .store
            .hash_get_all(&self.inner.keys.session_processing())
            .await
            .or_log("session_processing.scan", Default::default());

        let lease_ms = i64::try_from(self.inner.slot_lease.as_millis()).unwrap_or(i64::MAX);
        for (session, started) in processing {
            let stale = started
                .parse::<i64>()
                .map(|started| now.saturating_sub(started) > lease_ms)
                .unwrap_or(true);
            if stale {
                warn!(session = %session, "reclaiming orphaned start slot");
                self.release(&session).await;
            }
        }

        self.resync_slots().await;
    }

    /// Lowers the slot counter to the size of the processing set.
    ///
    /// A release whose decrement failed leaves the counter too high with no
    /// processing entry left to reclaim. Runs under the drain marker, so no
    /// other drain admits while the two are compared.
    async fn resync_slots(&self) {
        let inner = &self.inner;
        let slots_key = inner.keys.session_slots();
        let taken = match inner.store.get(&slots_key).await {
            Ok(Some(raw)) => raw.parse::<i64>().unwrap_or(0),
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "failed to read start slot counter");
                return;
            }
        };
        let held = match inner.store.hash_len(&inner.keys.session_processing()).await {
            Ok(held) => i64::try_from(held).unwrap_or(i64::MAX),
            Err(e) => {
                warn!(error = %e, "failed to count processing sessions");
                return;
            }
        };

        if taken > held {
            warn!(taken, held, "start slot counter drifted, resyncing");
            inner
                .store
                .incr_by(&slots_key, held - taken)
                .await
                .or_log("session_slots.resync", 0);
        }
    }

    /// Calls the session-start RPC, frees the slot, then schedules the next drain.
    ///
    /// An unregistered start has no processing entry, so its slot is given back directly.
    async fn start_session_async(self, entry: QueueEntry, registered: bool) {
        let session = entry.session.as_str();
        match self.inner.starter.start_session(session).await {
            Ok(()) => {
                metrics::counter!("courier_session_starts_total", "outcome" => "success")
                    .increment(1);
                info!(session, instance_id = ?entry.instance_id, "session started");
            }
            Err(e) => {
                metrics::counter!("courier_session_starts_total", "outcome" => "failure")
                    .increment(1);
                warn!(session, instance_id = ?entry.instance_id, error = %e, "session start failed");
            }
        }

        if registered {
            self.release(session).await;
        } else {
            self.give_back_slot().await;
        }

        tokio::time::sleep(self.inner.follow_up_delay).await;
        self.drain_with_retry().await;
    }

    /// Number of entries waiting for a slot.
    pub async fn queue_len(&self) -> Result<usize, CourierError> {
        self.inner
            .store
            .list_len(&self.inner.keys.session_queue())
            .await
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot, CourierError> {
        let inner = &self.inner;
        let queued = inner
            .store
            .list_range(&inner.keys.session_queue(), 0, -1)
            .await?
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect();
        let processing = inner
            .store
            .hash_get_all(&inner.keys.session_processing())
            .await?
            .into_iter()
            .map(|(session, started)| (session, started.parse().unwrap_or_default()))
            .collect();
        Ok(QueueSnapshot { queued, processing })
    }
}

impl std::fmt::Debug for SessionStartQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStartQueue")
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("drain_debounce", &self.inner.drain_debounce)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use courier_store::MemoryStore;
    use courier_test_utils::{FailingStore, FlakyStore, MockSessionStarter};
    use tracing_test::traced_test;

    use super::*;

    fn queue(store: Arc<dyn KvStore>, starter: Arc<MockSessionStarter>) -> SessionStartQueue {
        SessionStartQueue::new(
            store,
            StoreKeys::default(),
            starter,
            &StartQueueConfig::default(),
        )
    }

    async fn push(store: &MemoryStore, session: &str) {
        let entry = QueueEntry {
            session: session.into(),
            instance_id: None,
        };
        store
            .list_push(
                &StoreKeys::default().session_queue(),
                &serde_json::to_string(&entry).unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn positions_follow_queue_length() {
        let store = Arc::new(MemoryStore::new());
        let starter = Arc::new(MockSessionStarter::new().with_delay(Duration::from_secs(60)));
        let queue = queue(store, starter);

        // The first drain admits immediately, so later positions count only
        // what is still waiting.
        assert_eq!(queue.queue_session_start("a", Some("inst-a")).await.unwrap(), 1);
        tokio::task::yield_now().await;
        assert_eq!(queue.queue_session_start("b", None).await.unwrap(), 1);
        assert_eq!(queue.queue_session_start("c", None).await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn admits_at_most_the_ceiling() {
        let store = Arc::new(MemoryStore::new());
        let starter = Arc::new(MockSessionStarter::new().with_delay(Duration::from_secs(30)));
        for name in ["s1", "s2", "s3", "s4", "s5"] {
            push(&store, name).await;
        }
        let queue = queue(store.clone(), starter.clone());

        assert_eq!(queue.process_queue().await, DrainOutcome::Admitted(3));
        tokio::task::yield_now().await;

        let snapshot = queue.snapshot().await.unwrap();
        assert_eq!(snapshot.processing.len(), 3);
        let waiting: Vec<_> = snapshot.queued.iter().map(|e| e.session.as_str()).collect();
        assert_eq!(waiting, ["s4", "s5"]);
        assert_eq!(starter.max_in_flight().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn second_drain_within_window_is_debounced() {
        let store = Arc::new(MemoryStore::new());
        let starter = Arc::new(MockSessionStarter::new());
        let queue = queue(store, starter);

        assert_eq!(queue.process_queue().await, DrainOutcome::Admitted(0));
        assert_eq!(queue.process_queue().await, DrainOutcome::Debounced);
        tokio::time::advance(Duration::from_millis(2_001)).await;
        assert_eq!(queue.process_queue().await, DrainOutcome::Admitted(0));
    }

    #[tokio::test(start_paused = true)]
    async fn full_slots_report_saturation() {
        let store = Arc::new(MemoryStore::new());
        let starter = Arc::new(MockSessionStarter::new().with_delay(Duration::from_secs(60)));
        for name in ["s1", "s2", "s3", "s4"] {
            push(&store, name).await;
        }
        let queue = queue(store, starter);

        assert_eq!(queue.process_queue().await, DrainOutcome::Admitted(3));
        tokio::time::advance(Duration::from_millis(2_001)).await;
        assert_eq!(queue.process_queue().await, DrainOutcome::Saturated);
        assert_eq!(queue.queue_len().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_drains_completely_in_fifo_order() {
        let store = Arc::new(MemoryStore::new());
        let starter = Arc::new(MockSessionStarter::new().with_delay(Duration::from_millis(500)));
        let queue = queue(store.clone(), starter.clone());

        for name in ["s1", "s2", "s3", "s4", "s5", "s6", "s7"] {
            queue.queue_session_start(name, None).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(
            starter.started().await,
            ["s1", "s2", "s3", "s4", "s5", "s6", "s7"]
        );
        assert!(starter.max_in_flight().await <= 3);
        let snapshot = queue.snapshot().await.unwrap();
        assert!(snapshot.queued.is_empty());
        assert!(snapshot.processing.is_empty());
        assert_eq!(
            store
                .get(&StoreKeys::default().session_slots())
                .await
                .unwrap()
                .as_deref(),
            Some("0")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_frees_its_slot() {
        let store = Arc::new(MemoryStore::new());
        let starter = Arc::new(MockSessionStarter::new().failing_for("bad"));
        let queue = queue(store, starter.clone());

        for name in ["bad", "s2", "s3", "s4"] {
            queue.queue_session_start(name, None).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(starter.started().await.len(), 4);
        assert!(queue.snapshot().await.unwrap().processing.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn orphaned_slots_are_reclaimed() {
        let store = Arc::new(MemoryStore::new());
        let keys = StoreKeys::default();
        let starter = Arc::new(MockSessionStarter::new());
        let stale = (now_ms() - 301_000).to_string();
        for name in ["dead1", "dead2", "dead3"] {
            store
                .hash_set(&keys.session_processing(), name, &stale)
                .await
                .unwrap();
        }
        store.set(&keys.session_slots(), "3", None).await.unwrap();
        push(&store, "fresh").await;

        let queue = queue(store, starter.clone());
        assert_eq!(queue.process_queue().await, DrainOutcome::Admitted(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(starter.started().await, ["fresh"]);
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn failed_releases_do_not_wedge_the_queue() {
        let store = Arc::new(FlakyStore::new());
        let starter = Arc::new(MockSessionStarter::new().with_delay(Duration::from_secs(1)));
        let queue = queue(store.clone(), starter.clone());

        for name in ["s1", "s2", "s3"] {
            queue.queue_session_start(name, None).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(queue.snapshot().await.unwrap().processing.len(), 3);

        // Every release decrement fails while the three starts finish.
        store.fail_decrements(3);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(queue.snapshot().await.unwrap().processing.is_empty());
        assert!(logs_contain("failed to release start slot"));

        for name in ["s4", "s5"] {
            queue.queue_session_start(name, None).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(starter.started().await, ["s1", "s2", "s3", "s4", "s5"]);
        assert_eq!(queue.queue_len().await.unwrap(), 0);
        assert_eq!(
            store
                .get(&StoreKeys::default().session_slots())
                .await
                .unwrap()
                .as_deref(),
            Some("0")
        );
        assert!(logs_contain("start slot counter drifted"));
    }

    #[traced_test]
    #[tokio::test]
    async fn store_outage_is_reported_not_raised() {
        let starter = Arc::new(MockSessionStarter::new());
        let queue = queue(Arc::new(FailingStore), starter);

        assert_eq!(queue.process_queue().await, DrainOutcome::Unavailable);
        assert!(queue.queue_session_start("s1", None).await.is_err());
        assert!(logs_contain("store unavailable"));
    }
}
