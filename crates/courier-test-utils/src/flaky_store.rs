// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-memory [`KvStore`] that fails a chosen number of specific calls.
//!
//! Used to reproduce a short store blip in the middle of a flow, after which
//! the store behaves normally again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use courier_core::{AdapterType, CourierError, HealthStatus, KvStore, PluginAdapter};
use courier_store::MemoryStore;

/// Wraps [`MemoryStore`] and fails armed operations until their budget runs out.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    decrement_failures: AtomicUsize,
    push_failures: AtomicUsize,
}

/// Takes one failure from `budget` if any are left.
fn take(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn blip<T>() -> Result<T, CourierError> {
    Err(CourierError::store("connection reset by peer"))
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `n` calls to `incr_by` with a negative delta.
    pub fn fail_decrements(&self, n: usize) {
        self.decrement_failures.store(n, Ordering::SeqCst);
    }

    /// Fails the next `n` calls to `list_push`.
    pub fn fail_pushes(&self, n: usize) {
        self.push_failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl PluginAdapter for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::KvStore
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CourierError> {
        self.inner.set(key, value, ttl).await
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, CourierError> {
        self.inner.set_nx(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CourierError> {
        self.inner.delete(key).await
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, CourierError> {
        self.inner.delete_if_eq(key, expected).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CourierError> {
        if delta < 0 && take(&self.decrement_failures) {
            return blip();
        }
        self.inner.incr_by(key, delta).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CourierError> {
        self.inner.expire(key, ttl).await
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, CourierError> {
        if take(&self.push_failures) {
            return blip();
        }
        self.inner.list_push(key, value).await
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CourierError> {
        self.inner.list_range(key, start, stop).await
    }

    async fn list_len(&self, key: &str) -> Result<usize, CourierError> {
        self.inner.list_len(key).await
    }

    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> Result<(), CourierError> {
        self.inner.list_trim(key, start, stop).await
    }

    async fn list_pop_front(&self, key: &str) -> Result<Option<String>, CourierError> {
        self.inner.list_pop_front(key).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), CourierError> {
        self.inner.hash_set(key, field, value).await
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, CourierError> {
        self.inner.hash_delete(key, field).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CourierError> {
        self.inner.hash_get_all(key).await
    }

    async fn hash_len(&self, key: &str) -> Result<usize, CourierError> {
        self.inner.hash_len(key).await
    }

    async fn ping(&self) -> Result<(), CourierError> {
        self.inner.ping().await
    }
}
