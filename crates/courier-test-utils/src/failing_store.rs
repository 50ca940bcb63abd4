// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [`KvStore`] whose every call fails, for outage paths.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use courier_core::{AdapterType, CourierError, HealthStatus, KvStore, PluginAdapter};

#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

fn outage<T>() -> Result<T, CourierError> {
    Err(CourierError::store("connection refused"))
}

#[async_trait]
impl PluginAdapter for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::KvStore
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Unhealthy("connection refused".into()))
    }
}

#[async_trait]
impl KvStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CourierError> {
        outage()
    }

    async fn set(&self, _: &str, _: &str, _: Option<Duration>) -> Result<(), CourierError> {
        outage()
    }

    async fn set_nx(&self, _: &str, _: &str, _: Option<Duration>) -> Result<bool, CourierError> {
        outage()
    }

    async fn delete(&self, _key: &str) -> Result<bool, CourierError> {
        outage()
    }

    async fn delete_if_eq(&self, _key: &str, _expected: &str) -> Result<bool, CourierError> {
        outage()
    }

    async fn incr_by(&self, _key: &str, _delta: i64) -> Result<i64, CourierError> {
        outage()
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool, CourierError> {
        outage()
    }

    async fn list_push(&self, _key: &str, _value: &str) -> Result<usize, CourierError> {
        outage()
    }

    async fn list_range(&self, _: &str, _: isize, _: isize) -> Result<Vec<String>, CourierError> {
        outage()
    }

    async fn list_len(&self, _key: &str) -> Result<usize, CourierError> {
        outage()
    }

    async fn list_trim(&self, _: &str, _: isize, _: isize) -> Result<(), CourierError> {
        outage()
    }

    async fn list_pop_front(&self, _key: &str) -> Result<Option<String>, CourierError> {
        outage()
    }

    async fn hash_set(&self, _: &str, _: &str, _: &str) -> Result<(), CourierError> {
        outage()
    }

    async fn hash_delete(&self, _key: &str, _field: &str) -> Result<bool, CourierError> {
        outage()
    }

    async fn hash_get_all(&self, _key: &str) -> Result<HashMap<String, String>, CourierError> {
        outage()
    }

    async fn hash_len(&self, _key: &str) -> Result<usize, CourierError> {
        outage()
    }

    async fn ping(&self) -> Result<(), CourierError> {
        outage()
    }
}
