// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process [`KvStore`] with Redis semantics.
//!
//! Every operation holds the DashMap shard lock for its key for the whole
//! read-modify-write, which gives the same single-key atomicity Redis does.
//! Expiry uses `tokio::time::Instant`, so paused-clock tests can step over TTLs.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use courier_core::{AdapterType, CourierError, HealthStatus, KvStore, PluginAdapter};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
    Hash(HashMap<String, String>),
}

#[derive(Debug)]
struct Slot {
    value: Option<Value>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn vacant() -> Self {
        Self {
            value: None,
            expires_at: None,
        }
    }

    fn clear(&mut self) {
        self.value = None;
        self.expires_at = None;
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn list_mut(&mut self) -> Result<Option<&mut VecDeque<String>>, CourierError> {
        match &mut self.value {
            None => Ok(None),
            Some(Value::List(list)) => Ok(Some(list)),
            Some(_) => Err(CourierError::store(WRONG_TYPE)),
        }
    }

    fn hash_mut(&mut self) -> Result<Option<&mut HashMap<String, String>>, CourierError> {
        match &mut self.value {
            None => Ok(None),
            Some(Value::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(CourierError::store(WRONG_TYPE)),
        }
    }

    /// Redis removes containers once they become empty.
    fn drop_if_empty(&mut self) {
        let empty = match &self.value {
            Some(Value::List(list)) => list.is_empty(),
            Some(Value::Hash(hash)) => hash.is_empty(),
            _ => false,
        };
        if empty {
            self.clear();
        }
    }
}

/// Resolves Redis-style inclusive `start..=stop` indices against `len`.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len || stop < 0 {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

/// Single-process shared store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Slot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the live slot for `key` while holding its shard lock.
    fn with_slot<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Slot, Instant) -> Result<R, CourierError>,
    ) -> Result<R, CourierError> {
        let now = Instant::now();
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(Slot::vacant);
        if slot.is_expired(now) {
            slot.clear();
        }
        let result = f(&mut slot, now);
        slot.drop_if_empty();
        let vacant = slot.value.is_none();
        drop(slot);
        if vacant {
            self.entries.remove_if(key, |_, s| s.value.is_none());
        }
        result
    }

    /// Number of live keys. Test helper.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| e.value.is_some() && !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::KvStore
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError> {
        self.with_slot(key, |slot, _| match &slot.value {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(CourierError::store(WRONG_TYPE)),
        })
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CourierError> {
        self.with_slot(key, |slot, now| {
            slot.value = Some(Value::Str(value.to_string()));
            slot.expires_at = ttl.map(|ttl| now + ttl);
            Ok(())
        })
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, CourierError> {
        self.with_slot(key, |slot, now| {
            if slot.value.is_some() {
                return Ok(false);
            }
            slot.value = Some(Value::Str(value.to_string()));
            slot.expires_at = ttl.map(|ttl| now + ttl);
            Ok(true)
        })
    }

    async fn delete(&self, key: &str) -> Result<bool, CourierError> {
        self.with_slot(key, |slot, _| {
            let existed = slot.value.is_some();
            slot.clear();
            Ok(existed)
        })
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, CourierError> {
        self.with_slot(key, |slot, _| match &slot.value {
            Some(Value::Str(current)) if current == expected => {
                slot.clear();
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CourierError> {
        self.with_slot(key, |slot, _| {
            let current = match &slot.value {
                None => 0,
                Some(Value::Str(s)) => s.parse::<i64>().map_err(|_| {
                    CourierError::store("ERR value is not an integer or out of range")
                })?,
                Some(_) => return Err(CourierError::store(WRONG_TYPE)),
            };
            let next = current + delta;
            // INCR keeps any existing TTL.
            slot.value = Some(Value::Str(next.to_string()));
            Ok(next)
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CourierError> {
        self.with_slot(key, |slot, now| {
            if slot.value.is_none() {
                return Ok(false);
            }
            slot.expires_at = Some(now + ttl);
            Ok(true)
        })
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, CourierError> {
        self.with_slot(key, |slot, _| {
            if slot.value.is_none() {
                slot.value = Some(Value::List(VecDeque::new()));
            }
            let list = slot
                .list_mut()?
                .ok_or_else(|| CourierError::Internal("list vanished".into()))?;
            list.push_back(value.to_string());
            Ok(list.len())
        })
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CourierError> {
        self.with_slot(key, |slot, _| {
            let Some(list) = slot.list_mut()? else {
                return Ok(Vec::new());
            };
            Ok(match resolve_range(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            })
        })
    }

    async fn list_len(&self, key: &str) -> Result<usize, CourierError> {
        self.with_slot(key, |slot, _| Ok(slot.list_mut()?.map_or(0, |l| l.len())))
    }

    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> Result<(), CourierError> {
        self.with_slot(key, |slot, _| {
            let Some(list) = slot.list_mut()? else {
                return Ok(());
            };
            match resolve_range(list.len(), start, stop) {
                Some((from, to)) => {
                    list.truncate(to + 1);
                    list.drain(..from);
                }
                None => list.clear(),
            }
            Ok(())
        })
    }

    async fn list_pop_front(&self, key: &str) -> Result<Option<String>, CourierError> {
        self.with_slot(key, |slot, _| {
            Ok(slot.list_mut()?.and_then(|list| list.pop_front()))
        })
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), CourierError> {
        self.with_slot(key, |slot, _| {
            if slot.value.is_none() {
                slot.value = Some(Value::Hash(HashMap::new()));
            }
            let hash = slot
                .hash_mut()?
                .ok_or_else(|| CourierError::Internal("hash vanished".into()))?;
            hash.insert(field.to_string(), value.to_string());
            Ok(())
        })
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, CourierError> {
        self.with_slot(key, |slot, _| {
            Ok(slot
                .hash_mut()?
                .is_some_and(|hash| hash.remove(field).is_some()))
        })
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CourierError> {
        self.with_slot(key, |slot, _| {
            Ok(slot.hash_mut()?.map(|h| h.clone()).unwrap_or_default())
        })
    }

    async fn hash_len(&self, key: &str) -> Result<usize, CourierError> {
        self.with_slot(key, |slot, _| Ok(slot.hash_mut()?.map_or(0, |h| h.len())))
    }

    async fn ping(&self) -> Result<(), CourierError> {
        Ok(())
    }
}
