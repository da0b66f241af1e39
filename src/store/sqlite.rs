//! SQLite-backed document store.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use super::{DocumentStore, WriteError};
use crate::models::Record;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS intermediaries (
    entity_type TEXT NOT NULL,
    identity_key TEXT NOT NULL,
    fields TEXT NOT NULL,
    scraped_at TEXT NOT NULL,
    PRIMARY KEY (entity_type, identity_key)
);
";

/// Document store over a single SQLite database file.
///
/// One row per logical entity; conflicting writes fully replace the stored
/// field map (last-write-wins).
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, WriteError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WriteError::Database(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self, WriteError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Total stored documents, optionally scoped to one entity type.
    pub async fn count(&self, entity_type: Option<&str>) -> Result<usize, WriteError> {
        let conn = self.conn.lock().await;
        let count: i64 = match entity_type {
            Some(entity) => conn
                .query_row(
                    "SELECT COUNT(*) FROM intermediaries WHERE entity_type = ?1",
                    params![entity],
                    |row| row.get(0),
                )
                .map_err(db_err)?,
            None => conn
                .query_row("SELECT COUNT(*) FROM intermediaries", [], |row| row.get(0))
                .map_err(db_err)?,
        };
        Ok(count as usize)
    }

    /// Fetch one stored field map by key.
    pub async fn get(
        &self,
        entity_type: &str,
        identity_key: &str,
    ) -> Result<Option<BTreeMap<String, String>>, WriteError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT fields FROM intermediaries WHERE entity_type = ?1 AND identity_key = ?2",
            )
            .map_err(db_err)?;
        let mut rows = stmt
            .query(params![entity_type, identity_key])
            .map_err(db_err)?;

        match rows.next().map_err(db_err)? {
            Some(row) => {
                let fields: String = row.get(0).map_err(db_err)?;
                let fields = serde_json::from_str(&fields)
                    .map_err(|e| WriteError::Database(e.to_string()))?;
                Ok(Some(fields))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn upsert_batch(&self, records: &[Record]) -> Result<(), WriteError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(db_err)?;
        let scraped_at = Utc::now().to_rfc3339();

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO intermediaries (entity_type, identity_key, fields, scraped_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (entity_type, identity_key)
                     DO UPDATE SET fields = excluded.fields, scraped_at = excluded.scraped_at",
                )
                .map_err(db_err)?;

            for record in records {
                let fields = serde_json::to_string(&record.fields)
                    .map_err(|e| WriteError::Database(e.to_string()))?;
                stmt.execute(params![
                    record.entity_type,
                    record.identity_key,
                    fields,
                    scraped_at
                ])
                .map_err(db_err)?;
            }
        }

        tx.commit().map_err(db_err)?;
        debug!("Committed batch of {} records", records.len());
        Ok(())
    }
}

fn db_err(err: rusqlite::Error) -> WriteError {
    WriteError::Database(err.to_string())
}
