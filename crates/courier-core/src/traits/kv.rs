// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared key-value store trait.
//!
//! All cross-invocation coordination (queues, counters, busy flags) lives
//! behind this trait. Each method is a single-key atomic operation; there
//! is no multi-key transaction.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;

/// Redis-shaped key-value primitives.
///
/// List indices follow Redis semantics: negative indices count from the
/// tail, `list_range(key, 0, -1)` returns the whole list.
#[async_trait]
pub trait KvStore: PluginAdapter {
    /// Reads a string value.
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError>;

    /// Writes a string value, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
    -> Result<(), CourierError>;

    /// Writes a string value only if the key does not exist.
    ///
    /// Returns `true` if the value was written.
    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, CourierError>;

    /// Deletes a key of any type. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> Result<bool, CourierError>;

    /// Deletes a string key only while it still holds `expected`.
    ///
    /// Returns `true` if the key was deleted. Lease holders release with this
    /// so that a lease taken over by someone else is left alone.
    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, CourierError>;

    /// Atomically adds `delta` to an integer value (absent counts as 0).
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CourierError>;

    /// Sets a TTL on an existing key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CourierError>;

    /// Appends to the tail of a list. Returns the new length.
    async fn list_push(&self, key: &str, value: &str) -> Result<usize, CourierError>;

    /// Returns the elements between `start` and `stop`, inclusive.
    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CourierError>;

    /// Returns the length of a list (0 if absent).
    async fn list_len(&self, key: &str) -> Result<usize, CourierError>;

    /// Keeps only the elements between `start` and `stop`, inclusive.
    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> Result<(), CourierError>;

    /// Removes and returns the head of a list.
    async fn list_pop_front(&self, key: &str) -> Result<Option<String>, CourierError>;

    /// Sets a field of a hash.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), CourierError>;

    /// Deletes a field of a hash. Returns `true` if the field existed.
    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, CourierError>;

    /// Returns every field of a hash.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CourierError>;

    /// Returns the number of fields in a hash.
    async fn hash_len(&self, key: &str) -> Result<usize, CourierError>;

    /// Round-trips to the backend.
    async fn ping(&self) -> Result<(), CourierError>;
}
