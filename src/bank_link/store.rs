//! BankLinkStore: link tokens, connected accounts and accounts awaiting
//! a link to an asset or liability. Also mirrors each account's
//! transactions and investment holdings.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, broadcast};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::activity::{
    Holding, HoldingSyncResponse, Transaction, TransactionList, TransactionQuery,
    TransactionSyncAllResponse, TransactionSyncResponse,
};
use super::model::{
    ConnectedAccount, LinkEntity, LinkOutcome, LinkStatus, LinkToken, PlaidAccountInfo,
    SyncResponse,
};
use crate::api::BankLinkApi;
use crate::error::{Result, StoreError};
use crate::events::{DEFAULT_BROADCAST_CAPACITY, StoreEvent};
use crate::store::{self, Cache, snapshot_keys};

/// Persisted part of the store. The link token stays in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Inner {
    accounts: Vec<ConnectedAccount>,
    pending_links: Vec<PlaidAccountInfo>,
    /// Newest first, keyed by connected account id.
    #[serde(default)]
    transactions: BTreeMap<String, Vec<Transaction>>,
    #[serde(default)]
    holdings: BTreeMap<String, Vec<Holding>>,
    #[serde(skip)]
    link_token: Option<LinkToken>,
}

pub struct BankLinkStore {
    api: Arc<dyn BankLinkApi>,
    cache: Arc<dyn Cache>,
    user_id: String,
    inner: RwLock<Inner>,
    write_lock: Mutex<()>,
    tx: broadcast::Sender<StoreEvent>,
}

impl BankLinkStore {
    pub fn new(
        api: Arc<dyn BankLinkApi>,
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

    pub async fn hydrate(&self) -> bool {
        let cached: Option<Inner> =
            store::load_json(self.cache.as_ref(), &self.user_id, snapshot_keys::BANK_LINK).await;
        let Some(cached) = cached else {
            return false;
        };
        debug!(
            accounts = cached.accounts.len(),
            pending = cached.pending_links.len(),
            "Bank links hydrated from cache"
        );
        *self.inner.write().await = cached;
        self.notify().await;
        true
    }

    /// A link token for the aggregator widget, reused while fresh.
    pub async fn create_link_token(&self) -> Result<LinkToken> {
        let _guard = self.write_lock.lock().await;

        if let Some(token) = self.inner.read().await.link_token.clone() {
            if !token.is_expired() {
                debug!("Reusing cached link token");
                return Ok(token);
            }
        }

        let token = self.api.create_link_token().await?;
        info!("Link token issued");
        self.inner.write().await.link_token = Some(token.clone());
        Ok(token)
    }

    /// Exchange the widget's public token. The returned accounts exist on
    /// the backend but still need linking to an asset or liability.
    pub async fn exchange_public_token(&self, public_token: &str) -> Result<Vec<PlaidAccountInfo>> {
        let accounts: Vec<PlaidAccountInfo> = {
            let _guard = self.write_lock.lock().await;
            let accounts: Vec<PlaidAccountInfo> = self
                .api
                .exchange_public_token(public_token)
                .await?
                .into_iter()
                .map(PlaidAccountInfo::with_suggestion)
                .collect();

            {
                let mut inner = self.inner.write().await;
                // Public tokens are single-use, and so is the link token behind them.
                inner.link_token = None;
                for account in &accounts {
                    inner.pending_links.retain(|p| p.account_id != account.account_id);
                    inner.pending_links.push(account.clone());
                }
            }
            info!(accounts = accounts.len(), "Public token exchanged");
            accounts
        };
        self.notify().await;

        if let Err(e) = self.refresh_accounts().await {
            warn!("Failed to refresh accounts after exchange: {}", e);
            self.persist().await;
        }
        Ok(accounts)
    }

    pub async fn refresh_accounts(&self) -> Result<Vec<ConnectedAccount>> {
        let _guard = self.write_lock.lock().await;
        let accounts = self.api.list_accounts().await?;
        debug!(accounts = accounts.len(), "Connected accounts refreshed");
        self.inner.write().await.accounts = accounts.clone();
        self.notify().await;
        self.persist().await;
        Ok(accounts)
    }

    /// Sync every active account, then refresh the list.
    pub async fn sync_all(&self) -> Result<SyncResponse> {
        let response = self.api.sync_all().await?;
        if let Some(errors) = response.errors.as_ref().filter(|e| !e.is_empty()) {
            for error in errors {
                warn!(
                    account = error.account_name.as_deref().unwrap_or("unknown"),
                    "Account sync failed: {}",
                    error.error
                );
            }
        }
        info!(
            successful = response.successful.unwrap_or(0),
            failed = response.failed.unwrap_or(0),
            "{}",
            response.message
        );
        self.refresh_accounts().await?;
        Ok(response)
    }

    pub async fn sync_account(&self, id: &str) -> Result<SyncResponse> {
        let response = self.api.sync_account(id).await?;
        if response.success {
            info!(account_id = id, "Account synced");
        } else {
            warn!(account_id = id, "Account sync failed: {}", response.message);
        }
        self.refresh_accounts().await?;
        Ok(response)
    }

    /// Attach a connected account to an asset or liability. A partial
    /// outcome (linked, but the first sync failed) is not an error.
    pub async fn link_account(&self, id: &str, entity: LinkEntity) -> Result<LinkOutcome> {
        let outcome = self.api.link_account(id, &entity).await?;
        match outcome.status {
            LinkStatus::Ok => info!(account_id = id, entity_id = %entity.entity_id, "Account linked"),
            LinkStatus::Partial => warn!(
                account_id = id,
                entity_id = %entity.entity_id,
                "Account linked but sync failed: {}",
                outcome.sync_error.as_deref().unwrap_or("unknown error")
            ),
        }

        self.inner
            .write()
            .await
            .pending_links
            .retain(|p| p.account_id != id);
        self.notify().await;

        if let Err(e) = self.refresh_accounts().await {
            warn!("Failed to refresh accounts after link: {}", e);
            self.persist().await;
        }
        Ok(outcome)
    }

    /// Disconnect an account. It leaves the local list immediately and
    /// comes back if the backend refuses.
    pub async fn disconnect(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let (index, removed) = {
            let mut inner = self.inner.write().await;
            let index = inner
                .accounts
                .iter()
                .position(|a| a.id == id)
                .ok_or_else(|| StoreError::AccountNotFound { id: id.to_string() })?;
            let removed = inner.accounts.remove(index);
            (index, removed)
        };
        self.notify().await;

        if let Err(e) = self.api.disconnect(id).await {
            {
                let mut inner = self.inner.write().await;
                let at = index.min(inner.accounts.len());
                inner.accounts.insert(at, removed);
            }
            self.notify().await;
            warn!(account_id = id, error = %e, "Rolled back disconnect");
            let _ = self.tx.send(StoreEvent::AccountsRolledBack {
                operation: "disconnect".into(),
                reason: e.to_string(),
            });
            return Err(e.into());
        }

        {
            let mut inner = self.inner.write().await;
            inner.pending_links.retain(|p| p.account_id != id);
            inner.transactions.remove(id);
            inner.holdings.remove(id);
        }
        info!(account_id = id, institution = %removed.institution_name, "Account disconnected");
        self.persist().await;
        Ok(())
    }

    // ── Transactions and holdings ───────────────────────────────────

    /// One page of an account's transactions. An unfiltered first page
    /// replaces the cached list; any other page is merged in by id.
    pub async fn fetch_transactions(
        &self,
        account_id: &str,
        query: &TransactionQuery,
    ) -> Result<TransactionList> {
        query.validate()?;
        let _guard = self.write_lock.lock().await;
        let page = self.api.account_transactions(account_id, query).await?;
        let replace =
            page.offset == 0 && query.start_date.is_none() && query.end_date.is_none();
        {
            let mut inner = self.inner.write().await;
            let cached = inner.transactions.entry(account_id.to_string()).or_default();
            if replace {
                cached.clear();
            }
            merge_transactions(cached, page.transactions.iter().cloned());
        }
        debug!(
            account_id,
            fetched = page.transactions.len(),
            total = page.total,
            "Transactions fetched"
        );
        self.notify_activity(account_id).await;
        self.persist().await;
        Ok(page)
    }

    /// Transactions across every account. Each row lands in its account's
    /// cached list.
    pub async fn fetch_recent_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<TransactionList> {
        query.validate()?;
        let _guard = self.write_lock.lock().await;
        let page = self.api.list_transactions(query).await?;

        let mut by_account: BTreeMap<&str, Vec<Transaction>> = BTreeMap::new();
        for tx in &page.transactions {
            by_account
                .entry(tx.connected_account_id.as_str())
                .or_default()
                .push(tx.clone());
        }
        {
            let mut inner = self.inner.write().await;
            for (account_id, rows) in &by_account {
                let cached = inner.transactions.entry(account_id.to_string()).or_default();
                merge_transactions(cached, rows.iter().cloned());
            }
        }
        debug!(
            fetched = page.transactions.len(),
            accounts = by_account.len(),
            "Recent transactions fetched"
        );
        for account_id in by_account.keys() {
            self.notify_activity(account_id).await;
        }
        self.persist().await;
        Ok(page)
    }

    /// Pull new transactions for every active account, then reload the
    /// first page of each account already mirrored.
    pub async fn sync_transactions(&self) -> Result<TransactionSyncAllResponse> {
        let response = self.api.sync_transactions().await?;
        if let Some(errors) = response.errors.as_ref().filter(|e| !e.is_empty()) {
            for error in errors {
                warn!(
                    account = error.account_name.as_deref().unwrap_or("unknown"),
                    "Transaction sync failed: {}",
                    error.error
                );
            }
        }
        info!(
            successful = response.successful,
            failed = response.failed,
            added = response.total_added,
            modified = response.total_modified,
            removed = response.total_removed,
            "{}",
            response.message
        );

        let mirrored: Vec<String> = self.inner.read().await.transactions.keys().cloned().collect();
        for account_id in mirrored {
            if let Err(e) = self
                .fetch_transactions(&account_id, &TransactionQuery::default())
                .await
            {
                warn!(account_id = %account_id, "Failed to reload transactions after sync: {}", e);
            }
        }
        Ok(response)
    }

    pub async fn sync_account_transactions(&self, account_id: &str) -> Result<TransactionSyncResponse> {
        let response = self.api.sync_account_transactions(account_id).await?;
        if !response.success {
            warn!(account_id, "Transaction sync failed: {}", response.message);
            return Ok(response);
        }
        info!(
            account_id,
            added = response.added,
            modified = response.modified,
            removed = response.removed,
            "Transactions synced"
        );
        if let Err(e) = self
            .fetch_transactions(account_id, &TransactionQuery::default())
            .await
        {
            warn!(account_id, "Failed to reload transactions after sync: {}", e);
        }
        Ok(response)
    }

    pub async fn fetch_holdings(&self, account_id: &str) -> Result<Vec<Holding>> {
        let _guard = self.write_lock.lock().await;
        let list = self.api.account_holdings(account_id).await?;
        debug!(account_id, holdings = list.total, "Holdings fetched");
        self.inner
            .write()
            .await
            .holdings
            .insert(account_id.to_string(), list.holdings.clone());
        self.notify_activity(account_id).await;
        self.persist().await;
        Ok(list.holdings)
    }

    /// Refresh an investment account's positions. The backend also stamps
    /// the account's sync time, so the account list is reloaded too.
    pub async fn sync_holdings(&self, account_id: &str) -> Result<HoldingSyncResponse> {
        let response = self.api.sync_holdings(account_id).await?;
        if !response.success {
            warn!(account_id, "Holdings sync failed: {}", response.message);
            return Ok(response);
        }
        info!(
            account_id,
            holdings = response.added,
            securities = response.securities,
            "Holdings synced"
        );
        if let Err(e) = self.fetch_holdings(account_id).await {
            warn!(account_id, "Failed to reload holdings after sync: {}", e);
        }
        if let Err(e) = self.refresh_accounts().await {
            warn!("Failed to refresh accounts after holdings sync: {}", e);
        }
        Ok(response)
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub async fn connected_accounts(&self) -> Vec<ConnectedAccount> {
        self.inner.read().await.accounts.clone()
    }

    pub async fn active_accounts(&self) -> Vec<ConnectedAccount> {
        self.inner
            .read()
            .await
            .accounts
            .iter()
            .filter(|a| a.is_active)
            .cloned()
            .collect()
    }

    pub async fn pending_links(&self) -> Vec<PlaidAccountInfo> {
        self.inner.read().await.pending_links.clone()
    }

    /// Active accounts whose last sync failed.
    pub async fn accounts_with_errors(&self) -> Vec<ConnectedAccount> {
        self.inner
            .read()
            .await
            .accounts
            .iter()
            .filter(|a| a.is_active && a.last_sync_error.is_some())
            .cloned()
            .collect()
    }

    /// Cached transactions for an account, newest first.
    pub async fn transactions(&self, account_id: &str) -> Vec<Transaction> {
        self.inner
            .read()
            .await
            .transactions
            .get(account_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn holdings(&self, account_id: &str) -> Vec<Holding> {
        self.inner
            .read()
            .await
            .holdings
            .get(account_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Sum of the institution's valuation of every cached position.
    pub async fn holdings_value(&self, account_id: &str) -> Decimal {
        self.inner
            .read()
            .await
            .holdings
            .get(account_id)
            .map(|h| h.iter().map(|h| h.institution_value).sum())
            .unwrap_or_default()
    }

    async fn notify_activity(&self, account_id: &str) {
        let event = {
            let inner = self.inner.read().await;
            StoreEvent::AccountActivityChanged {
                account_id: account_id.to_string(),
                transactions: inner.transactions.get(account_id).map_or(0, Vec::len),
                holdings: inner.holdings.get(account_id).map_or(0, Vec::len),
            }
        };
        let _ = self.tx.send(event);
    }

    async fn notify(&self) {
        let event = {
            let inner = self.inner.read().await;
            StoreEvent::AccountsChanged {
                connected: inner.accounts.len(),
                pending_links: inner.pending_links.len(),
            }
        };
        let _ = self.tx.send(event);
    }

    async fn persist(&self) {
        let inner = self.inner.read().await;
        store::persist_json(
            self.cache.as_ref(),
            &self.user_id,
            snapshot_keys::BANK_LINK,
            &*inner,
        )
        .await;
    }
}

/// Upsert by id, then restore newest-first order.
fn merge_transactions(cached: &mut Vec<Transaction>, incoming: impl IntoIterator<Item = Transaction>) {
    for tx in incoming {
        match cached.iter_mut().find(|t| t.id == tx.id) {
            Some(existing) => *existing = tx,
            None => cached.push(tx),
        }
    }
    cached.sort_by(|a, b| b.date.cmp(&a.date));
}
