//! Interaction history store
//!
//! SQLite-backed, append-only log of inbound/outbound interactions plus a small
//! key/value context table. One async mutex guards the single connection, so
//! every read and write is serialised and record ids follow lock order.
//!
//! Layout:
//! - `queries(id, timestamp, direction, content, metadata)`
//! - `context(key, value, updated_at)`
//!
//! `content`, `metadata` and `value` are stored as JSON text.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

const CREATE_QUERIES: &str = r#"
    CREATE TABLE IF NOT EXISTS queries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        direction TEXT NOT NULL,
        content TEXT NOT NULL,
        metadata TEXT
    )
"#;

const CREATE_CONTEXT: &str = r#"
    CREATE TABLE IF NOT EXISTS context (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Caller -> system
    In,
    /// System -> caller
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(format!("unknown direction {:?}", other)),
        }
    }
}

/// One stored interaction. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub timestamp: i64,
    pub direction: Direction,
    pub content: Value,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub key: String,
    pub value: Value,
    pub updated_at: i64,
}

pub struct HistoryStore {
    conn: Mutex<SqliteConnection>,
    retention: Option<u64>,
}

impl HistoryStore {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::Storage(sqlx::Error::Io(e)))?;
            }
        }

        let conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(30))
            .connect()
            .await?;

        tracing::info!("History store opened at {}", path.display());
        Self::from_connection(conn).await
    }

    /// Private in-memory database, used by tests and throwaway runs.
    pub async fn in_memory() -> Result<Self> {
        let conn = SqliteConnection::connect("sqlite::memory:").await?;
        Self::from_connection(conn).await
    }

    async fn from_connection(mut conn: SqliteConnection) -> Result<Self> {
        ensure_schema(&mut conn).await?;
        Ok(Self {
            conn: Mutex::new(conn),
            retention: None,
        })
    }

    /// Keep only the newest `max_records` rows. `None` or `Some(0)` keeps everything.
    pub fn with_retention(mut self, max_records: Option<u64>) -> Self {
        self.retention = max_records.filter(|&n| n > 0);
        self
    }

    /// Create tables if missing. Safe to call any number of times.
    pub async fn initialize(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        ensure_schema(&mut conn).await
    }

    /// Append a record and return its id. Missing metadata is stored as `{}`.
    pub async fn append(
        &self,
        timestamp: i64,
        direction: Direction,
        content: &Value,
        metadata: Option<&Value>,
    ) -> Result<i64> {
        let content = serde_json::to_string(content)?;
        let metadata = match metadata {
            Some(meta) => serde_json::to_string(meta)?,
            None => "{}".to_string(),
        };

        let mut conn = self.conn.lock().await;
        ensure_schema(&mut conn).await?;

        // insert and prune commit together
        let mut tx = conn.begin().await?;
        let id = sqlx::query(
            "INSERT INTO queries (timestamp, direction, content, metadata) VALUES (?, ?, ?, ?)",
        )
        .bind(timestamp)
        .bind(direction.as_str())
        .bind(content)
        .bind(metadata)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        if let Some(keep) = self.retention {
            let pruned = sqlx::query(
                "DELETE FROM queries WHERE id NOT IN (SELECT id FROM queries ORDER BY id DESC LIMIT ?)",
            )
            .bind(keep as i64)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if pruned > 0 {
                tracing::debug!("Pruned {} history records beyond retention of {}", pruned, keep);
            }
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Most recent records first. A limit above the row count returns everything.
    pub async fn recent(&self, limit: u32) -> Result<Vec<HistoryRecord>> {
        let mut conn = self.conn.lock().await;
        ensure_schema(&mut conn).await?;

        let rows = sqlx::query(
            "SELECT id, timestamp, direction, content, metadata FROM queries ORDER BY id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&mut *conn)
        .await?;
        drop(conn);

        rows.iter().map(history_from_row).collect()
    }

    pub async fn count(&self) -> Result<i64> {
        let mut conn = self.conn.lock().await;
        ensure_schema(&mut conn).await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queries")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    /// Insert or overwrite the value stored under `key`.
    pub async fn set_context(&self, key: &str, value: &Value, updated_at: i64) -> Result<()> {
        let value = serde_json::to_string(value)?;
        let mut conn = self.conn.lock().await;
        ensure_schema(&mut conn).await?;

        sqlx::query(
            r#"
            INSERT INTO context (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_context(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.context_record(key).await?.map(|record| record.value))
    }

    pub async fn context_record(&self, key: &str) -> Result<Option<ContextRecord>> {
        let mut conn = self.conn.lock().await;
        ensure_schema(&mut conn).await?;

        let row = sqlx::query("SELECT key, value, updated_at FROM context WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;
        drop(conn);

        match row {
            Some(row) => {
                let value: String = row.try_get("value")?;
                Ok(Some(ContextRecord {
                    key: row.try_get("key")?,
                    value: serde_json::from_str(&value)?,
                    updated_at: row.try_get("updated_at")?,
                }))
            }
            None => Ok(None),
        }
    }
}

async fn ensure_schema(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(CREATE_QUERIES).execute(&mut *conn).await?;
    sqlx::query(CREATE_CONTEXT).execute(&mut *conn).await?;
    Ok(())
}

fn history_from_row(row: &SqliteRow) -> Result<HistoryRecord> {
    let direction: String = row.try_get("direction")?;
    let content: String = row.try_get("content")?;
    let metadata: Option<String> = row.try_get("metadata")?;

    Ok(HistoryRecord {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
        direction: direction
            .parse()
            .map_err(|e: String| Error::Storage(sqlx::Error::Decode(e.into())))?,
        content: serde_json::from_str(&content)?,
        metadata: serde_json::from_str(metadata.as_deref().unwrap_or("{}"))?,
    })
}
