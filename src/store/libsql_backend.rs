//! libSQL cache backend: `Cache` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::serde_util::parse_utc;
use crate::store::migrations;
use crate::store::traits::{Cache, Snapshot};

/// libSQL cache backend.
///
/// Holds a single connection reused for all operations.
pub struct LibSqlCache {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlCache {
    /// Open (or create) a local cache file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::Pool(format!("Failed to create cache directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL cache: {e}")))?;

        let cache = Self::from_database(db)?;
        cache.run_migrations().await?;
        info!(path = %path.display(), "Cache opened");
        Ok(cache)
    }

    /// Create an in-memory cache (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to create in-memory cache: {e}")))?;

        let cache = Self::from_database(db)?;
        cache.run_migrations().await?;
        Ok(cache)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    parse_utc(s).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn row_to_snapshot(row: &libsql::Row) -> Result<Snapshot, DatabaseError> {
    let key: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("snapshot key: {e}")))?;
    let value_str: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("snapshot value: {e}")))?;
    let updated_at: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("snapshot updated_at: {e}")))?;
    let value = serde_json::from_str(&value_str)
        .map_err(|e| DatabaseError::Serialization(format!("snapshot '{key}': {e}")))?;

    Ok(Snapshot {
        key,
        value,
        updated_at: parse_datetime(&updated_at),
    })
}

#[async_trait]
impl Cache for LibSqlCache {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn load_snapshot(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<Snapshot>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, value, updated_at FROM snapshots WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_snapshot: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_snapshot(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load_snapshot: {e}"))),
        }
    }

    async fn save_snapshot(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let value_str = serde_json::to_string(value)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO snapshots (user_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
                params![user_id, key, value_str, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_snapshot: {e}")))?;

        debug!(user_id, key, "Snapshot saved");
        Ok(())
    }

    async fn delete_snapshot(&self, user_id: &str, key: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM snapshots WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_snapshot: {e}")))?;
        Ok(count > 0)
    }

    async fn list_snapshots(&self, user_id: &str) -> Result<Vec<Snapshot>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, value, updated_at FROM snapshots WHERE user_id = ?1 ORDER BY key",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_snapshots: {e}")))?;

        let mut snapshots = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            snapshots.push(row_to_snapshot(&row)?);
        }
        Ok(snapshots)
    }
}
