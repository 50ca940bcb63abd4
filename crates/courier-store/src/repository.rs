// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed [`InstanceRepository`].

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use courier_core::{
    AdapterType, CourierError, HealthStatus, InstanceRepository, InstanceStatus, PluginAdapter,
};

use crate::database::{Database, map_tr_err};

/// One row of the `instances` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub id: String,
    pub session_name: String,
    pub status: InstanceStatus,
    pub updated_at: DateTime<Utc>,
}

fn parse_row(
    id: String,
    session_name: String,
    status: String,
    updated_at: String,
) -> Result<InstanceRecord, CourierError> {
    let status = InstanceStatus::from_str(&status)
        .map_err(|_| CourierError::Internal(format!("unknown instance status '{status}'")))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| CourierError::Repository {
            source: Box::new(e),
        })?
        .with_timezone(&Utc);
    Ok(InstanceRecord {
        id,
        session_name,
        status,
        updated_at,
    })
}

/// Instance status store on the local SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteInstanceRepository {
    db: Database,
}

impl SqliteInstanceRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts an instance, or updates its session name and status if it exists.
    pub async fn upsert_instance(&self, record: &InstanceRecord) -> Result<(), CourierError> {
        let id = record.id.clone();
        let session_name = record.session_name.clone();
        let status = record.status.to_string();
        let updated_at = record.updated_at.to_rfc3339();

        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO instances (id, session_name, status, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                        session_name = excluded.session_name,
                        status = excluded.status,
                        updated_at = excluded.updated_at",
                    params![id, session_name, status, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err::<rusqlite::Error>)
    }

    pub async fn get_instance(&self, id: &str) -> Result<Option<InstanceRecord>, CourierError> {
        let id = id.to_string();
        let row = self
            .db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, session_name, status, updated_at FROM instances WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()
            })
            .await
            .map_err(map_tr_err::<rusqlite::Error>)?;

        row.map(|(id, session_name, status, updated_at)| {
            parse_row(id, session_name, status, updated_at)
        })
        .transpose()
    }
}

#[async_trait]
impl PluginAdapter for SqliteInstanceRepository {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Repository
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let probe = self
            .db
            .connection()
            .call(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map_err(map_tr_err::<rusqlite::Error>);
        Ok(match probe {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }
}

#[async_trait]
impl InstanceRepository for SqliteInstanceRepository {
    async fn instance_for_session(&self, session: &str) -> Result<Option<String>, CourierError> {
        let session = session.to_string();
        self.db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    "SELECT id FROM instances WHERE session_name = ?1",
                    params![session],
                    |row| row.get::<_, String>(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err::<rusqlite::Error>)
    }

    async fn update_instance_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), CourierError> {
        let id = instance_id.to_string();
        let status_text = status.to_string();
        let updated_at = updated_at.to_rfc3339();

        let changed = self
            .db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE instances SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status_text, updated_at, id],
                )
            })
            .await
            .map_err(map_tr_err::<rusqlite::Error>)?;

        if changed == 0 {
            return Err(CourierError::Internal(format!(
                "instance '{instance_id}' not found"
            )));
        }
        debug!(instance_id, %status, "instance status persisted");
        Ok(())
    }
}
