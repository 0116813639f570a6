//! Durable store contract and SQLite implementation.
//!
//! Plans, execution results, and feedback items are persisted as opaque JSON
//! records keyed by id. No schema migration logic lives here.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use crate::error::NexusError;

/// Contract for the external durable store.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Persist one record into a named collection. Records carrying an `id`
    /// field are upserted by that id.
    async fn put(&self, collection: &str, record: Value) -> Result<(), NexusError>;

    /// Fetch one record by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, NexusError>;
}

/// SQLite-backed document store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// In-memory store, mainly for tests.
    pub fn new() -> Result<Self, NexusError> {
        Self::open(":memory:")
    }

    /// Open a store at a specific database path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, NexusError> {
        let conn = Connection::open(path).map_err(|e| NexusError::Store(e.to_string()))?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), NexusError> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);
            "#,
        )
        .map_err(|e| NexusError::Store(e.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, NexusError> {
        self.conn
            .lock()
            .map_err(|e| NexusError::Store(format!("lock error: {}", e)))
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn put(&self, collection: &str, record: Value) -> Result<(), NexusError> {
        let id = record
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let body = serde_json::to_string(&record)?;
        let now = chrono::Utc::now().timestamp();

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO records (collection, id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![collection, id, body, now],
        )
        .map_err(|e| NexusError::Store(e.to_string()))?;

        debug!("Persisted record {} into '{}'", id, collection);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, NexusError> {
        let body: Option<String> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT body FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| NexusError::Store(e.to_string()))?
        };

        match body {
            Some(b) => Ok(Some(serde_json::from_str(&b)?)),
            None => Ok(None),
        }
    }
}
