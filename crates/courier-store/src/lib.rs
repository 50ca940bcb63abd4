// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence for the Courier session core.
//!
//! Two very different stores live here:
//!
//! - the **shared key-value store** ([`MemoryStore`], [`RedisStore`]) that
//!   carries every piece of cross-request coordination state, all of it
//!   ephemeral and TTL-bounded;
//! - the **instance repository** ([`SqliteInstanceRepository`]), the one
//!   durable record, holding each instance's canonical status.

pub mod database;
pub mod fail_soft;
pub mod keys;
pub mod memory;
pub mod migrations;
pub mod redis_store;
pub mod repository;

use std::sync::Arc;

use courier_config::model::{StoreBackend, StoreConfig};
use courier_core::{CourierError, KvStore};

pub use database::Database;
pub use fail_soft::LogOnError;
pub use keys::StoreKeys;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use repository::{InstanceRecord, SqliteInstanceRepository};

/// Opens the shared store selected by configuration.
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn KvStore>, CourierError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!(
                "using the in-memory store; coordination is limited to this process"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| CourierError::Config("store.redis_url is not set".into()))?;
            Ok(Arc::new(RedisStore::connect(url).await?))
        }
    }
}
