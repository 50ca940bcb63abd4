// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stuck-QR detection.
//!
//! While a device is unpaired the gateway keeps re-issuing QR codes. After
//! `threshold` consecutive QR events for one (instance, session) with no other
//! session event in between, the instance is queued for deletion and the
//! counter starts over.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use courier_config::model::QrGuardConfig;
use courier_core::{KvStore, SessionDeleter};
use courier_store::{LogOnError, StoreKeys};

/// Result of recording one QR event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanOutcome {
    pub scan_count: u32,
    pub delete_triggered: bool,
}

/// Counts consecutive QR events and triggers the corrective delete.
#[derive(Clone)]
pub struct QrScanGuard {
    store: Arc<dyn KvStore>,
    keys: StoreKeys,
    deleter: Arc<dyn SessionDeleter>,
    threshold: u32,
    counter_ttl: Duration,
}

impl QrScanGuard {
    pub fn new(
        store: Arc<dyn KvStore>,
        keys: StoreKeys,
        deleter: Arc<dyn SessionDeleter>,
        config: &QrGuardConfig,
    ) -> Self {
        Self {
            store,
            keys,
            deleter,
            threshold: config.threshold.max(1),
            counter_ttl: config.counter_ttl(),
        }
    }

    /// Records one QR event. On a store failure nothing is counted.
    pub async fn track_scan(&self, instance_id: &str, session: &str) -> ScanOutcome {
        let key = self.keys.qr_scan(instance_id, session);

        let count = match self.store.incr_by(&key, 1).await {
            Ok(count) => count,
            Err(e) => {
                warn!(instance_id, session, error = %e, "failed to count QR scan");
                return ScanOutcome::default();
            }
        };
        self.store
            .expire(&key, self.counter_ttl)
            .await
            .or_log("qr_scan.expire", false);

        // Only the scan that lands exactly on the threshold deletes; scans
        // racing past it see a higher count and leave the delete to that one.
        let scan_count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);
        if scan_count != self.threshold {
            debug!(instance_id, session, scan_count, "QR scan recorded");
            return ScanOutcome {
                scan_count,
                delete_triggered: false,
            };
        }

        warn!(
            instance_id,
            session, scan_count, "QR scan threshold reached, deleting instance"
        );
        self.trigger_session_delete(instance_id).await;
        self.store
            .delete(&key)
            .await
            .or_log("qr_scan.delete", false);

        ScanOutcome {
            scan_count,
            delete_triggered: true,
        }
    }

    /// Forgets the QR streak of a session.
    pub async fn reset_scan_count(&self, instance_id: &str, session: &str) {
        let key = self.keys.qr_scan(instance_id, session);
        self.store.delete(&key).await.or_log("qr_scan.reset", false);
    }

    /// Queues the instance delete. Failures are logged and swallowed.
    pub async fn trigger_session_delete(&self, instance_id: &str) {
        match self.deleter.queue_session_delete(instance_id).await {
            Ok(job) => {
                metrics::counter!("courier_qr_deletes_total").increment(1);
                info!(instance_id, job_id = %job.0, "instance delete queued");
            }
            Err(e) => {
                warn!(instance_id, error = %e, "failed to queue instance delete");
            }
        }
    }
}

impl std::fmt::Debug for QrScanGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrScanGuard")
            .field("threshold", &self.threshold)
            .field("counter_ttl", &self.counter_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use courier_store::MemoryStore;
    use courier_test_utils::{FailingStore, MockSessionDeleter};
    use tracing_test::traced_test;

    use super::*;

    fn guard(store: Arc<dyn KvStore>, deleter: Arc<MockSessionDeleter>) -> QrScanGuard {
        QrScanGuard::new(
            store,
            StoreKeys::default(),
            deleter,
            &QrGuardConfig::default(),
        )
    }

    #[tokio::test]
    async fn fifth_scan_triggers_delete_and_resets() {
        let deleter = Arc::new(MockSessionDeleter::new());
        let guard = guard(Arc::new(MemoryStore::new()), deleter.clone());

        for expected in 1..=4 {
            let outcome = guard.track_scan("inst-1", "s1").await;
            assert_eq!(outcome.scan_count, expected);
            assert!(!outcome.delete_triggered);
        }

        let fifth = guard.track_scan("inst-1", "s1").await;
        assert_eq!(fifth.scan_count, 5);
        assert!(fifth.delete_triggered);
        assert_eq!(deleter.deleted().await, ["inst-1"]);

        let sixth = guard.track_scan("inst-1", "s1").await;
        assert_eq!(sixth.scan_count, 1);
        assert!(!sixth.delete_triggered);
    }

    #[tokio::test]
    async fn concurrent_scans_past_threshold_delete_once() {
        let deleter = Arc::new(MockSessionDeleter::new());
        let store = Arc::new(MemoryStore::new());
        let guard = guard(store.clone(), deleter.clone());

        for _ in 0..4 {
            guard.track_scan("inst-1", "s1").await;
        }
        let (a, b) = tokio::join!(
            guard.track_scan("inst-1", "s1"),
            guard.track_scan("inst-1", "s1")
        );
        assert_eq!(
            [a.delete_triggered, b.delete_triggered]
                .iter()
                .filter(|t| **t)
                .count(),
            1
        );
        assert_eq!(deleter.deleted().await, ["inst-1"]);

        // A count already past the threshold belongs to a scan that raced the reset.
        store
            .set(&StoreKeys::default().qr_scan("inst-1", "s1"), "5", None)
            .await
            .unwrap();
        let late = guard.track_scan("inst-1", "s1").await;
        assert_eq!(late.scan_count, 6);
        assert!(!late.delete_triggered);
        assert_eq!(deleter.deleted().await.len(), 1);
    }

    #[tokio::test]
    async fn reset_breaks_the_streak() {
        let deleter = Arc::new(MockSessionDeleter::new());
        let guard = guard(Arc::new(MemoryStore::new()), deleter.clone());

        for _ in 0..4 {
            guard.track_scan("inst-1", "s1").await;
        }
        guard.reset_scan_count("inst-1", "s1").await;
        for _ in 0..4 {
            assert!(!guard.track_scan("inst-1", "s1").await.delete_triggered);
        }
        assert!(deleter.deleted().await.is_empty());
    }

    #[tokio::test]
    async fn sessions_are_counted_separately() {
        let deleter = Arc::new(MockSessionDeleter::new());
        let guard = guard(Arc::new(MemoryStore::new()), deleter);

        for _ in 0..3 {
            guard.track_scan("inst-1", "s1").await;
        }
        assert_eq!(guard.track_scan("inst-1", "s2").await.scan_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn streak_expires_after_counter_ttl() {
        let deleter = Arc::new(MockSessionDeleter::new());
        let guard = guard(Arc::new(MemoryStore::new()), deleter);

        for _ in 0..4 {
            guard.track_scan("inst-1", "s1").await;
        }
        tokio::time::advance(Duration::from_secs(601)).await;
        assert_eq!(guard.track_scan("inst-1", "s1").await.scan_count, 1);
    }

    #[traced_test]
    #[tokio::test]
    async fn failed_delete_is_swallowed() {
        let deleter = Arc::new(MockSessionDeleter::failing());
        let guard = guard(Arc::new(MemoryStore::new()), deleter);

        let mut last = ScanOutcome::default();
        for _ in 0..5 {
            last = guard.track_scan("inst-1", "s1").await;
        }
        assert!(last.delete_triggered);
        assert!(logs_contain("failed to queue instance delete"));
    }

    #[traced_test]
    #[tokio::test]
    async fn store_outage_counts_nothing() {
        let deleter = Arc::new(MockSessionDeleter::new());
        let guard = guard(Arc::new(FailingStore), deleter.clone());

        let outcome = guard.track_scan("inst-1", "s1").await;
        assert_eq!(outcome, ScanOutcome::default());
        guard.reset_scan_count("inst-1", "s1").await;
        assert!(deleter.deleted().await.is_empty());
        assert!(logs_contain("failed to count QR scan"));
    }
}
