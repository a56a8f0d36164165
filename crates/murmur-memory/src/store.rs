use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use thiserror::Error;
use tokio::task;
use uuid::Uuid;

use crate::migrations::run_migrations;
use crate::models::MemoryRecord;

/// Typed store failures. Read-path callers (the tool layer) collapse these
/// to an empty result; the distinction stays visible here and in logs.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("memory content must not be empty")]
    EmptyContent,
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("tag encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("storage task failed: {0}")]
    Task(String),
}

#[derive(Clone)]
pub struct MemoryStore {
    db: Arc<Mutex<Connection>>,
}

impl MemoryStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        run_migrations(&conn).map_err(|e| StoreError::Task(e.to_string()))?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn).map_err(|e| StoreError::Task(e.to_string()))?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Store a new memory about a user. Returns the created record.
    pub async fn add(
        &self,
        user_id: &str,
        memory: &str,
        tags: Vec<String>,
    ) -> Result<MemoryRecord, StoreError> {
        if memory.trim().is_empty() {
            return Err(StoreError::EmptyContent);
        }

        let record = MemoryRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            memory: memory.to_owned(),
            tags,
            timestamp: Utc::now(),
            updated_at: None,
        };

        let db = Arc::clone(&self.db);
        let stored = record.clone();
        task::spawn_blocking(move || {
            let tags = serde_json::to_string(&stored.tags)?;
            let conn = lock(&db)?;
            conn.execute(
                r#"
                INSERT INTO memories (id, user_id, memory, tags, timestamp, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, NULL)
                "#,
                params![
                    stored.id.to_string(),
                    stored.user_id,
                    stored.memory,
                    tags,
                    stored.timestamp.to_rfc3339(),
                ],
            )?;
            Ok::<(), StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

        Ok(record)
    }

    /// Records for `user_id`, optionally filtered by a case-insensitive
    /// substring match against content or any tag. Newest first.
    pub async fn search(
        &self,
        user_id: &str,
        query: Option<&str>,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        let records = self.user_records(user_id, None).await?;
        Ok(match query {
            Some(q) if !q.trim().is_empty() => {
                records.into_iter().filter(|r| r.matches(q)).collect()
            }
            _ => records,
        })
    }

    /// Up to `limit` most recent records for `user_id`, newest first.
    pub async fn list(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryRecord>, StoreError> {
        self.user_records(user_id, Some(limit)).await
    }

    /// Rewrite a record's content (and tags, when given). Refreshes the
    /// update timestamp. Returns false when no record has this id.
    ///
    /// Concurrent updates on one id are last-write-wins; there is no
    /// conflict token.
    pub async fn update(
        &self,
        id: Uuid,
        memory: &str,
        tags: Option<Vec<String>>,
    ) -> Result<bool, StoreError> {
        if memory.trim().is_empty() {
            return Err(StoreError::EmptyContent);
        }

        let db = Arc::clone(&self.db);
        let memory = memory.to_owned();
        let updated_at = Utc::now().to_rfc3339();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let changed = match tags {
                Some(tags) => {
                    let tags = serde_json::to_string(&tags)?;
                    conn.execute(
                        "UPDATE memories SET memory = ?1, tags = ?2, updated_at = ?3 WHERE id = ?4",
                        params![memory, tags, updated_at, id.to_string()],
                    )?
                }
                None => conn.execute(
                    "UPDATE memories SET memory = ?1, updated_at = ?2 WHERE id = ?3",
                    params![memory, updated_at, id.to_string()],
                )?,
            };
            Ok::<bool, StoreError>(changed > 0)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Remove a record. Returns false when no record has this id.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let changed = conn.execute("DELETE FROM memories WHERE id = ?1", [id.to_string()])?;
            Ok::<bool, StoreError>(changed > 0)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn user_records(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryRecord>, StoreError> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, user_id, memory, tags, timestamp, updated_at
                FROM memories
                WHERE user_id = ?1
                ORDER BY timestamp DESC
                LIMIT ?2
                "#,
            )?;
            let limit = limit.map(|l| l as i64).unwrap_or(-1);
            let rows = stmt.query_map(params![user_id, limit], row_to_record)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok::<Vec<MemoryRecord>, StoreError>(records)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn lock(db: &Arc<Mutex<Connection>>) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
    db.lock()
        .map_err(|_| StoreError::Task("failed to lock sqlite connection".into()))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let id: String = row.get(0)?;
    let tags: String = row.get(3)?;
    let timestamp: String = row.get(4)?;
    let updated_at: Option<String> = row.get(5)?;

    Ok(MemoryRecord {
        id: id.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        user_id: row.get(1)?,
        memory: row.get(2)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        timestamp: parse_timestamp(&timestamp)?,
        updated_at: updated_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn parse_timestamp(raw: &str) -> rusqlite::Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}
