use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::middleware::AppError;
use crate::models::ConversationState;
use crate::storage::CheckpointStore;

/// SQLite-backed conversation checkpoints
/// Uses tokio::Mutex for async-friendly locking
pub struct SqliteCheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCheckpointStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        // Accept sqlite:./path and sqlite://path as well as bare paths
        let path_str = db_path.as_ref().to_string_lossy();
        let clean_path: &str = if path_str.starts_with("sqlite:") {
            path_str.trim_start_matches("sqlite:").trim_start_matches("//")
        } else {
            path_str.as_ref()
        };

        let conn = Connection::open(clean_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                conversation_id TEXT PRIMARY KEY,
                state_json TEXT NOT NULL,
                turn_count INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_checkpoints_updated ON checkpoints(updated_at DESC)",
            [],
        )?;

        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, AppError> {
        let conn = self.conn.lock().await;
        let state_json: Option<String> = conn
            .query_row(
                "SELECT state_json FROM checkpoints WHERE conversation_id = ?1",
                rusqlite::params![conversation_id],
                |row| row.get(0),
            )
            .optional()?;

        match state_json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, conversation_id: &str, state: &ConversationState) -> Result<(), AppError> {
        let state_json = serde_json::to_string(state)?;
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO checkpoints (conversation_id, state_json, turn_count, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(conversation_id) DO UPDATE SET
                state_json = excluded.state_json,
                turn_count = excluded.turn_count,
                updated_at = excluded.updated_at
            "#,
            rusqlite::params![
                conversation_id,
                state_json,
                state.turn_count as i64,
                state.updated_at.to_rfc3339(),
            ],
        )?;
        tracing::debug!("Checkpointed conversation {} (turn {})", conversation_id, state.turn_count);
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<bool, AppError> {
        let conn = self.conn.lock().await;
        let affected = conn.execute(
            "DELETE FROM checkpoints WHERE conversation_id = ?1",
            rusqlite::params![conversation_id],
        )?;
        Ok(affected > 0)
    }
}
