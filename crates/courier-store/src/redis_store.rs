// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redis-backed [`KvStore`], shared by every Courier replica.
//!
//! Each trait method is exactly one Redis command, so each inherits Redis'
//! single-command atomicity. `set_nx` is `SET key value NX PX ttl`, and
//! `delete_if_eq` is a short `EVAL` script.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::info;

use courier_core::{AdapterType, CourierError, HealthStatus, KvStore, PluginAdapter};

fn store_err(e: redis::RedisError) -> CourierError {
    CourierError::Store {
        source: Box::new(e),
    }
}

/// GET and DEL in one server-side step.
const DELETE_IF_EQ: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

fn millis(ttl: Duration) -> u64 {
    // PX 0 is rejected by Redis.
    (ttl.as_millis() as u64).max(1)
}

/// Shared store on top of a multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connects to `url` (`redis://` or `rediss://`).
    pub async fn connect(url: &str) -> Result<Self, CourierError> {
        let client = redis::Client::open(url).map_err(store_err)?;
        let conn = ConnectionManager::new(client).await.map_err(store_err)?;
        info!("connected to redis shared store");
        Ok(Self { conn })
    }

    async fn query<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T, CourierError> {
        let mut conn = self.conn.clone();
        cmd.query_async(&mut conn).await.map_err(store_err)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl PluginAdapter for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::KvStore
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        match self.ping().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CourierError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(millis(ttl));
        }
        self.query(&cmd).await
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, CourierError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(millis(ttl));
        }
        let reply: Option<String> = self.query(&cmd).await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, CourierError> {
        let removed: i64 = self.query(redis::cmd("DEL").arg(key)).await?;
        Ok(removed > 0)
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, CourierError> {
        let removed: i64 = self
            .query(
                redis::cmd("EVAL")
                    .arg(DELETE_IF_EQ)
                    .arg(1)
                    .arg(key)
                    .arg(expected),
            )
            .await?;
        Ok(removed > 0)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CourierError> {
        self.query(redis::cmd("INCRBY").arg(key).arg(delta)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CourierError> {
        let applied: i64 = self
            .query(redis::cmd("PEXPIRE").arg(key).arg(millis(ttl)))
            .await?;
        Ok(applied == 1)
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, CourierError> {
        self.query(redis::cmd("RPUSH").arg(key).arg(value)).await
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CourierError> {
        self.query(redis::cmd("LRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    async fn list_len(&self, key: &str) -> Result<usize, CourierError> {
        self.query(redis::cmd("LLEN").arg(key)).await
    }

    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> Result<(), CourierError> {
        self.query(redis::cmd("LTRIM").arg(key).arg(start).arg(stop))
            .await
    }

    async fn list_pop_front(&self, key: &str) -> Result<Option<String>, CourierError> {
        self.query(redis::cmd("LPOP").arg(key)).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), CourierError> {
        let _: i64 = self
            .query(redis::cmd("HSET").arg(key).arg(field).arg(value))
            .await?;
        Ok(())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, CourierError> {
        let removed: i64 = self.query(redis::cmd("HDEL").arg(key).arg(field)).await?;
        Ok(removed > 0)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CourierError> {
        self.query(redis::cmd("HGETALL").arg(key)).await
    }

    async fn hash_len(&self, key: &str) -> Result<usize, CourierError> {
        self.query(redis::cmd("HLEN").arg(key)).await
    }

    async fn ping(&self) -> Result<(), CourierError> {
        let _: String = self.query(&redis::cmd("PING")).await?;
        Ok(())
    }
}
