//! Viva history storage using SQLite
//!
//! Past sessions are kept as one JSON array under the `vivaHistory` key of a
//! small key/value table, most recent first and capped at [`HISTORY_LIMIT`].

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::conversation::{Difficulty, Topic};

/// Storage key holding the session list
pub const HISTORY_KEY: &str = "vivaHistory";

/// Number of past sessions retained
pub const HISTORY_LIMIT: usize = 10;

/// A finished viva, as shown in the history list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: String,
    pub topic: String,
    pub date: String,
    pub duration: u64,
    pub score: u8,
    pub difficulty: Difficulty,
}

impl InterviewSession {
    /// Record for a session that just finished
    pub fn finished(topic: Topic, difficulty: Difficulty, duration: u64, score: u8) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            date: Local::now().format("%-m/%-d/%Y").to_string(),
            duration,
            score,
            difficulty,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persistence port for finished sessions
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Past sessions, most recent first. Missing or corrupt data reads as empty.
    async fn load(&self) -> Vec<InterviewSession>;

    /// Prepends a session and keeps only the most recent entries
    async fn append(&self, session: InterviewSession) -> Result<Vec<InterviewSession>, HistoryError>;
}

/// SQLite-backed history store
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Create a new store with the given SQLite database path
    pub async fn new(db_path: &Path) -> Result<Self, sqlx::Error> {
        // Create parent directories if they don't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an in-memory store
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Raw value stored under `key`
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Overwrites the value stored under `key`
    pub async fn set_raw(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl SqliteHistoryStore {
    /// Reads the stored list. Absent or malformed data reads as empty; a
    /// failed read is an error so callers never overwrite what they could
    /// not see.
    pub async fn try_load(&self) -> Result<Vec<InterviewSession>, HistoryError> {
        let Some(raw) = self.get_raw(HISTORY_KEY).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<InterviewSession>>(&raw) {
            Ok(sessions) => Ok(sessions),
            Err(e) => {
                tracing::warn!("Ignoring malformed viva history: {}", e);
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn load(&self) -> Vec<InterviewSession> {
        self.try_load().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to read viva history: {}", e);
            Vec::new()
        })
    }

    async fn append(&self, session: InterviewSession) -> Result<Vec<InterviewSession>, HistoryError> {
        let mut sessions = self.try_load().await?;
        sessions.insert(0, session);
        sessions.truncate(HISTORY_LIMIT);

        let encoded = serde_json::to_string(&sessions)?;
        self.set_raw(HISTORY_KEY, &encoded).await?;

        tracing::debug!("Viva history now holds {} session(s)", sessions.len());
        Ok(sessions)
    }
}
