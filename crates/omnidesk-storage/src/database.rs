// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use omnidesk_core::OmniError;
use rusqlite::ErrorCode;
use tracing::debug;

use crate::migrations::run_migrations;

/// Handle to the ledger database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs and run migrations.
    pub async fn open(path: &str) -> Result<Self, OmniError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| OmniError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| OmniError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(true).await?;
        debug!(path, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, OmniError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| OmniError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal: bool) -> Result<(), OmniError> {
        self.conn
            .call(move |conn| -> Result<(), OmniError> {
                let journal = if wal { "WAL" } else { "MEMORY" };
                conn.execute_batch(&format!(
                    "PRAGMA journal_mode = {journal};
                     PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;"
                ))
                .map_err(|e| OmniError::Storage {
                    source: Box::new(e),
                })?;
                run_migrations(conn)
            })
            .await
            .map_err(|e| match e {
                tokio_rusqlite::Error::Error(inner) => inner,
                other => OmniError::Storage {
                    source: Box::new(other),
                },
            })
    }

    /// The shared connection; every query goes through its background thread.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the main database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), OmniError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint and close the connection.
    pub async fn close(self) -> Result<(), OmniError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(|e| OmniError::Storage {
            source: Box::new(e),
        })
    }
}

/// Convert a tokio-rusqlite error into OmniError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> OmniError {
    OmniError::Storage {
        source: Box::new(e),
    }
}

/// Like [`map_tr_err`], but a uniqueness violation becomes [`OmniError::Conflict`].
pub(crate) fn map_insert_err(
    entity: &'static str,
    key: String,
) -> impl FnOnce(tokio_rusqlite::Error<rusqlite::Error>) -> OmniError {
    move |e| match &e {
        tokio_rusqlite::Error::Error(rusqlite::Error::SqliteFailure(failure, _))
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            OmniError::Conflict { entity, key }
        }
        _ => map_tr_err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_schema_and_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/ledger.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();

        for table in ["channel_accounts", "interactions", "messages", "reporters", "threads"] {
            assert!(tables.iter().any(|t| t == table), "missing {table}");
        }
        db.close().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn reopening_does_not_rerun_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        Database::open(path.to_str().unwrap())
            .await
            .unwrap()
            .close()
            .await
            .unwrap();
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.checkpoint().await.unwrap();
    }
}
