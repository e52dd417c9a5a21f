//! NetWorthStore: cached assets, liabilities and the backend summary.
//!
//! Totals and breakdowns are always the backend's; mutations only touch the
//! item lists and then ask for a fresh summary. Until it arrives the old
//! one is served and flagged stale.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{
    Asset, AssetCategory, AssetUpdate, Liability, LiabilityCategory, LiabilityUpdate,
    NetWorthSummary, NewAsset, NewLiability,
};
use crate::api::NetWorthApi;
use crate::error::{ApiError, Result, StoreError};
use crate::events::{DEFAULT_BROADCAST_CAPACITY, StoreEvent};
use crate::store::{self, Cache, snapshot_keys};

/// What gets written to the local cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Cached {
    assets: Vec<Asset>,
    liabilities: Vec<Liability>,
    summary: Option<NetWorthSummary>,
}

#[derive(Debug, Default)]
struct Inner {
    assets: Vec<Asset>,
    liabilities: Vec<Liability>,
    summary: Option<NetWorthSummary>,
    /// Bumped on every local change to the item lists.
    revision: u64,
    /// `revision` as of the request that produced `summary`.
    summary_revision: u64,
}

impl Inner {
    fn touch(&mut self) {
        self.revision += 1;
    }

    fn is_stale(&self) -> bool {
        self.summary.is_none() || self.summary_revision < self.revision
    }
}

pub struct NetWorthStore {
    api: Arc<dyn NetWorthApi>,
    cache: Arc<dyn Cache>,
    user_id: String,
    inner: RwLock<Inner>,
    write_lock: Mutex<()>,
    tx: broadcast::Sender<StoreEvent>,
}

impl NetWorthStore {
    pub fn new(
        api: Arc<dyn NetWorthApi>,
        cache: Arc<dyn Cache>,
        user_id: impl Into<String>,
    ) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            api,
            cache,
            user_id: user_id.into(),
            inner: RwLock::new(Inner::default()),
            write_lock: Mutex::new(()),
            tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Load the last persisted lists and summary. Returns whether anything
    /// was cached.
    pub async fn hydrate(&self) -> bool {
        let cached: Option<Cached> =
            store::load_json(self.cache.as_ref(), &self.user_id, snapshot_keys::NET_WORTH).await;
        let Some(cached) = cached else {
            return false;
        };

        {
            let mut inner = self.inner.write().await;
            inner.assets = cached.assets;
            inner.liabilities = cached.liabilities;
            inner.summary = cached.summary;
            inner.revision = 0;
            inner.summary_revision = 0;
            debug!(
                assets = inner.assets.len(),
                liabilities = inner.liabilities.len(),
                "Net worth hydrated from cache"
            );
        }
        self.notify().await;
        true
    }

    /// Fetch assets, liabilities and the summary, replacing all three.
    pub async fn refresh(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let (assets, liabilities, summary) = tokio::try_join!(
            self.api.list_assets(),
            self.api.list_liabilities(),
            self.api.net_worth(),
        )?;

        {
            let mut inner = self.inner.write().await;
            info!(
                assets = assets.len(),
                liabilities = liabilities.len(),
                net_worth = %summary.net_worth,
                "Net worth refreshed"
            );
            inner.assets = assets;
            inner.liabilities = liabilities;
            inner.summary = Some(summary);
            inner.touch();
            inner.summary_revision = inner.revision;
        }
        self.notify().await;
        self.persist().await;
        Ok(())
    }

    /// Fetch only the summary.
    pub async fn refresh_summary(&self) -> Result<NetWorthSummary> {
        let requested_at = self.inner.read().await.revision;
        let summary = self.api.net_worth().await?;

        {
            let mut inner = self.inner.write().await;
            // An older response never replaces a newer one.
            if requested_at >= inner.summary_revision {
                inner.summary = Some(summary.clone());
                inner.summary_revision = requested_at;
            }
        }
        self.notify().await;
        self.persist().await;
        Ok(summary)
    }

    /// Re-fetch the summary after a successful mutation. The mutation
    /// already landed, so a failure here only leaves the summary stale.
    async fn resync_summary(&self) {
        if let Err(e) = self.refresh_summary().await {
            warn!("Net worth summary refresh failed, serving stale totals: {}", e);
        }
    }

    // ── Assets ──────────────────────────────────────────────────────

    pub async fn add_asset(&self, new: NewAsset) -> Result<Asset> {
        new.validate()?;
        let created = {
            let _guard = self.write_lock.lock().await;
            let temp_id = placeholder_id();
            let base = self.revision().await;

            self.edit(|inner| inner.assets.push(new.placeholder(temp_id.clone())))
                .await;

            match self.api.create_asset(&new).await {
                Ok(asset) => {
                    self.edit(|inner| replace_by_id(&mut inner.assets, &temp_id, asset.clone()))
                        .await;
                    info!(id = %asset.id, category = %asset.category, "Asset added");
                    asset
                }
                Err(e) => {
                    self.undo(base, |inner| inner.assets.retain(|a| a.id != temp_id))
                        .await;
                    self.rolled_back("add_asset", &e);
                    return Err(e.into());
                }
            }
        };
        self.persist().await;
        self.resync_summary().await;
        Ok(created)
    }

    pub async fn update_asset(&self, id: &str, update: AssetUpdate) -> Result<Asset> {
        update.validate()?;
        let updated = {
            let _guard = self.write_lock.lock().await;
            let previous = self
                .asset(id)
                .await
                .ok_or_else(|| StoreError::AssetNotFound { id: id.to_string() })?;
            let base = self.revision().await;

            self.edit(|inner| {
                if let Some(asset) = inner.assets.iter_mut().find(|a| a.id == id) {
                    update.apply_to(asset);
                }
            })
            .await;

            match self.api.update_asset(id, &update).await {
                Ok(asset) => {
                    self.edit(|inner| replace_by_id(&mut inner.assets, id, asset.clone()))
                        .await;
                    info!(id, "Asset updated");
                    asset
                }
                Err(e) => {
                    self.undo(base, |inner| replace_by_id(&mut inner.assets, id, previous))
                        .await;
                    self.rolled_back("update_asset", &e);
                    return Err(e.into());
                }
            }
        };
        self.persist().await;
        self.resync_summary().await;
        Ok(updated)
    }

    pub async fn delete_asset(&self, id: &str) -> Result<()> {
        {
            let _guard = self.write_lock.lock().await;
            let (index, removed, base) = {
                let mut inner = self.inner.write().await;
                let index = inner
                    .assets
                    .iter()
                    .position(|a| a.id == id)
                    .ok_or_else(|| StoreError::AssetNotFound { id: id.to_string() })?;
                let base = inner.revision;
                let removed = inner.assets.remove(index);
                inner.touch();
                (index, removed, base)
            };
            self.notify().await;

            if let Err(e) = self.api.delete_asset(id).await {
                self.undo(base, |inner| {
                    let at = index.min(inner.assets.len());
                    inner.assets.insert(at, removed);
                })
                .await;
                self.rolled_back("delete_asset", &e);
                return Err(e.into());
            }
            info!(id, "Asset deleted");
        }
        self.persist().await;
        self.resync_summary().await;
        Ok(())
    }

    /// Re-fetch one asset and update the cached copy.
    pub async fn fetch_asset(&self, id: &str) -> Result<Asset> {
        let asset = self.api.get_asset(id).await?;
        self.edit(|inner| {
            if !replace_by_id(&mut inner.assets, id, asset.clone()) {
                inner.assets.push(asset.clone());
            }
        })
        .await;
        Ok(asset)
    }

    /// Re-fetch one category of assets, replacing the cached items in it.
    pub async fn fetch_assets_in(&self, category: AssetCategory) -> Result<Vec<Asset>> {
        let _guard = self.write_lock.lock().await;
        let fetched = self.api.assets_by_category(category).await?;
        debug!(category = %category, count = fetched.len(), "Asset category refreshed");
        self.edit(|inner| {
            inner
                .assets
                .retain(|a| a.category != category || is_placeholder(&a.id));
            inner.assets.extend(fetched.iter().cloned());
        })
        .await;
        self.persist().await;
        Ok(fetched)
    }

    // ── Liabilities ─────────────────────────────────────────────────

    pub async fn add_liability(&self, new: NewLiability) -> Result<Liability> {
        new.validate()?;
        let created = {
            let _guard = self.write_lock.lock().await;
            let temp_id = placeholder_id();
            let base = self.revision().await;

            self.edit(|inner| inner.liabilities.push(new.placeholder(temp_id.clone())))
                .await;

            match self.api.create_liability(&new).await {
                Ok(liability) => {
                    self.edit(|inner| {
                        replace_by_id(&mut inner.liabilities, &temp_id, liability.clone())
                    })
                    .await;
                    info!(id = %liability.id, category = %liability.category, "Liability added");
                    liability
                }
                Err(e) => {
                    self.undo(base, |inner| inner.liabilities.retain(|l| l.id != temp_id))
                        .await;
                    self.rolled_back("add_liability", &e);
                    return Err(e.into());
                }
            }
        };
        self.persist().await;
        self.resync_summary().await;
        Ok(created)
    }

    pub async fn update_liability(&self, id: &str, update: LiabilityUpdate) -> Result<Liability> {
        update.validate()?;
        let updated = {
            let _guard = self.write_lock.lock().await;
            let previous = self
                .liability(id)
                .await
                .ok_or_else(|| StoreError::LiabilityNotFound { id: id.to_string() })?;
            let base = self.revision().await;

            self.edit(|inner| {
                if let Some(liability) = inner.liabilities.iter_mut().find(|l| l.id == id) {
                    update.apply_to(liability);
                }
            })
            .await;

            match self.api.update_liability(id, &update).await {
                Ok(liability) => {
                    self.edit(|inner| replace_by_id(&mut inner.liabilities, id, liability.clone()))
                        .await;
                    info!(id, "Liability updated");
                    liability
                }
                Err(e) => {
                    self.undo(base, |inner| replace_by_id(&mut inner.liabilities, id, previous))
                        .await;
                    self.rolled_back("update_liability", &e);
                    return Err(e.into());
                }
            }
        };
        self.persist().await;
        self.resync_summary().await;
        Ok(updated)
    }

    pub async fn delete_liability(&self, id: &str) -> Result<()> {
        {
            let _guard = self.write_lock.lock().await;
            let (index, removed, base) = {
                let mut inner = self.inner.write().await;
                let index = inner
                    .liabilities
                    .iter()
                    .position(|l| l.id == id)
                    .ok_or_else(|| StoreError::LiabilityNotFound { id: id.to_string() })?;
                let base = inner.revision;
                let removed = inner.liabilities.remove(index);
                inner.touch();
                (index, removed, base)
            };
            self.notify().await;

            if let Err(e) = self.api.delete_liability(id).await {
                self.undo(base, |inner| {
                    let at = index.min(inner.liabilities.len());
                    inner.liabilities.insert(at, removed);
                })
                .await;
                self.rolled_back("delete_liability", &e);
                return Err(e.into());
            }
            info!(id, "Liability deleted");
        }
        self.persist().await;
        self.resync_summary().await;
        Ok(())
    }

    pub async fn fetch_liability(&self, id: &str) -> Result<Liability> {
        let liability = self.api.get_liability(id).await?;
        self.edit(|inner| {
            if !replace_by_id(&mut inner.liabilities, id, liability.clone()) {
                inner.liabilities.push(liability.clone());
            }
        })
        .await;
        Ok(liability)
    }

    pub async fn fetch_liabilities_in(
        &self,
        category: LiabilityCategory,
    ) -> Result<Vec<Liability>> {
        let _guard = self.write_lock.lock().await;
        let fetched = self.api.liabilities_by_category(category).await?;
        debug!(category = %category, count = fetched.len(), "Liability category refreshed");
        self.edit(|inner| {
            inner
                .liabilities
                .retain(|l| l.category != category || is_placeholder(&l.id));
            inner.liabilities.extend(fetched.iter().cloned());
        })
        .await;
        self.persist().await;
        Ok(fetched)
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub async fn assets(&self) -> Vec<Asset> {
        self.inner.read().await.assets.clone()
    }

    pub async fn liabilities(&self) -> Vec<Liability> {
        self.inner.read().await.liabilities.clone()
    }

    pub async fn asset(&self, id: &str) -> Option<Asset> {
        self.inner
            .read()
            .await
            .assets
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub async fn liability(&self, id: &str) -> Option<Liability> {
        self.inner
            .read()
            .await
            .liabilities
            .iter()
            .find(|l| l.id == id)
            .cloned()
    }

    /// Last summary received from the backend, possibly stale.
    pub async fn summary(&self) -> Option<NetWorthSummary> {
        self.inner.read().await.summary.clone()
    }

    pub async fn assets_in(&self, category: AssetCategory) -> Vec<Asset> {
        self.inner
            .read()
            .await
            .assets
            .iter()
            .filter(|a| a.category == category)
            .cloned()
            .collect()
    }

    pub async fn liabilities_in(&self, category: LiabilityCategory) -> Vec<Liability> {
        self.inner
            .read()
            .await
            .liabilities
            .iter()
            .filter(|l| l.category == category)
            .cloned()
            .collect()
    }

    /// Whether the summary predates the latest local change (or is missing).
    pub async fn is_stale(&self) -> bool {
        self.inner.read().await.is_stale()
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn edit<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let out = {
            let mut inner = self.inner.write().await;
            let out = f(&mut inner);
            inner.touch();
            out
        };
        self.notify().await;
        out
    }

    async fn revision(&self) -> u64 {
        self.inner.read().await.revision
    }

    /// Revert an optimistic edit made on top of revision `base`. When
    /// nothing else changed the lists since, the revision goes back too and
    /// the summary is current again.
    async fn undo<R>(&self, base: u64, f: impl FnOnce(&mut Inner) -> R) -> R {
        let out = {
            let mut inner = self.inner.write().await;
            let out = f(&mut inner);
            if inner.revision == base + 1 {
                inner.revision = base;
            } else {
                inner.touch();
            }
            out
        };
        self.notify().await;
        out
    }

    fn rolled_back(&self, operation: &str, error: &ApiError) {
        warn!(operation, error = %error, "Rolled back optimistic net worth change");
        let _ = self.tx.send(StoreEvent::NetWorthRolledBack {
            operation: operation.to_string(),
            reason: error.to_string(),
        });
    }

    async fn notify(&self) {
        let event = {
            let inner = self.inner.read().await;
            StoreEvent::NetWorthChanged {
                assets: inner.assets.len(),
                liabilities: inner.liabilities.len(),
                stale: inner.is_stale(),
            }
        };
        let _ = self.tx.send(event);
    }

    async fn persist(&self) {
        let cached = {
            let inner = self.inner.read().await;
            Cached {
                // Placeholders are never written out.
                assets: inner
                    .assets
                    .iter()
                    .filter(|a| !is_placeholder(&a.id))
                    .cloned()
                    .collect(),
                liabilities: inner
                    .liabilities
                    .iter()
                    .filter(|l| !is_placeholder(&l.id))
                    .cloned()
                    .collect(),
                summary: inner.summary.clone(),
            }
        };
        store::persist_json(
            self.cache.as_ref(),
            &self.user_id,
            snapshot_keys::NET_WORTH,
            &cached,
        )
        .await;
    }
}

const PLACEHOLDER_PREFIX: &str = "pending-";

pub(crate) fn placeholder_id() -> String {
    format!("{PLACEHOLDER_PREFIX}{}", Uuid::new_v4())
}

fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

trait HasId {
    fn id(&self) -> &str;
}

impl HasId for Asset {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for Liability {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Swap the item with `id` for `item` in place. Returns false if absent.
fn replace_by_id<T: HasId>(items: &mut [T], id: &str, item: T) -> bool {
    match items.iter_mut().find(|i| i.id() == id) {
        Some(slot) => {
            *slot = item;
            true
        }
        None => false,
    }
}
