//! `Cache` trait: async interface for the local snapshot store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;

/// Snapshot keys, one per client store.
pub mod snapshot_keys {
    pub const ONBOARDING_STATE: &str = "onboarding_state";
    pub const NET_WORTH: &str = "net_worth";
    pub const BANK_LINK: &str = "bank_link";
}

/// A persisted JSON snapshot of one store's state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Backend-agnostic local cache. Snapshots are partitioned by user id.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Load a snapshot, or `None` if nothing was saved under `key`.
    async fn load_snapshot(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<Snapshot>, DatabaseError>;

    /// Insert or replace a snapshot.
    async fn save_snapshot(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    /// Delete a snapshot. Returns whether a row was removed.
    async fn delete_snapshot(&self, user_id: &str, key: &str) -> Result<bool, DatabaseError>;

    /// List all snapshots for a user, ordered by key.
    async fn list_snapshots(&self, user_id: &str) -> Result<Vec<Snapshot>, DatabaseError>;
}
