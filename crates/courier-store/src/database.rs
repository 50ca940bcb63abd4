// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite connection lifecycle: PRAGMA setup, WAL mode, migrations.
//!
//! All statements run on tokio-rusqlite's single background thread.

use std::path::Path;

use courier_core::CourierError;
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// Maps a tokio-rusqlite failure into the repository error variant.
pub fn map_tr_err<E>(e: tokio_rusqlite::Error<E>) -> CourierError
where
    tokio_rusqlite::Error<E>: std::error::Error + Send + Sync + 'static,
{
    CourierError::Repository {
        source: Box::new(e),
    }
}

/// A migrated SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and applies migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CourierError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CourierError::Repository {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| CourierError::Repository {
                source: Box::new(e),
            })?;
        let db = Self::prepare(conn, true).await?;
        info!(path = %path.display(), "instance database opened");
        Ok(db)
    }

    /// Opens a private in-memory database, used by tests and the dry-run path.
    pub async fn open_in_memory() -> Result<Self, CourierError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| CourierError::Repository {
                source: Box::new(e),
            })?;
        Self::prepare(conn, false).await
    }

    async fn prepare(conn: tokio_rusqlite::Connection, wal: bool) -> Result<Self, CourierError> {
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal {
                let _mode: String =
                    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
                conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
            }
            conn.execute_batch("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| run_migrations(conn))
            .await
            .map_err(map_tr_err)?;
        debug!("migrations applied");

        Ok(Self { conn })
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Closes the connection, flushing the WAL.
    pub async fn close(self) -> Result<(), CourierError> {
        self.conn.close().await.map_err(map_tr_err)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
