//! Local persistence: libSQL-backed snapshots of each client store.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlCache;
pub use traits::{Cache, Snapshot, snapshot_keys};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Load and decode a snapshot. Cache or decode failures are logged and
/// treated as "nothing cached".
pub(crate) async fn load_json<T: DeserializeOwned>(
    cache: &dyn Cache,
    user_id: &str,
    key: &str,
) -> Option<T> {
    match cache.load_snapshot(user_id, key).await {
        Ok(Some(snapshot)) => match serde_json::from_value(snapshot.value) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, "Discarding unreadable cached snapshot: {}", e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key, "Failed to load cached snapshot: {}", e);
            None
        }
    }
}

/// Encode and save a snapshot. Failures are logged, never returned.
pub(crate) async fn persist_json<T: Serialize>(
    cache: &dyn Cache,
    user_id: &str,
    key: &str,
    value: &T,
) {
    let value = match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(key, "Failed to serialize snapshot: {}", e);
            return;
        }
    };
    if let Err(e) = cache.save_snapshot(user_id, key, &value).await {
        tracing::warn!(key, "Failed to persist snapshot: {}", e);
    }
}

/// Remove a snapshot. Failures are logged, never returned.
pub(crate) async fn forget(cache: &dyn Cache, user_id: &str, key: &str) {
    if let Err(e) = cache.delete_snapshot(user_id, key).await {
        tracing::warn!(key, "Failed to delete snapshot: {}", e);
    }
}
