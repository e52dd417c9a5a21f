//! In-memory backend used by store unit tests.
//!
//! Mirrors the server's observable behaviour closely enough to exercise
//! reconciliation: it assigns its own ids, appends generated tasks and
//! computes summaries itself. Any operation can be made to fail.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;

use super::{BankLinkApi, NetWorthApi, OnboardingApi};
use crate::bank_link::activity::{
    DEFAULT_TRANSACTION_PAGE, Holding, HoldingList, HoldingSyncResponse, Security, Transaction,
    TransactionList, TransactionQuery, TransactionSyncAllResponse, TransactionSyncResponse,
};
use crate::bank_link::model::{
    ConnectedAccount, LinkEntity, LinkOutcome, LinkStatus, LinkToken, PlaidAccountInfo,
    SyncResponse,
};
use crate::error::ApiError;
use crate::net_worth::model::{
    Asset, AssetCategory, AssetUpdate, CategoryBreakdown, Liability, LiabilityCategory,
    LiabilityUpdate, NetWorthSummary, NewAsset, NewLiability,
};
use crate::onboarding::engine;
use crate::onboarding::model::{
    AnswerRecord, AnswerRequest, AnswerResponse, HouseholdType, OnboardingState, OnboardingStatus,
    Progress, TaskCompleteRequest, TaskCompleteResponse,
};
use crate::onboarding::questions::EntityKind;

#[derive(Default)]
struct Inner {
    onboarding: Option<OnboardingState>,
    assets: Vec<Asset>,
    liabilities: Vec<Liability>,
    accounts: Vec<ConnectedAccount>,
    exchange_accounts: Vec<PlaidAccountInfo>,
    partial_link: Option<String>,
    transactions: Vec<Transaction>,
    holdings: Vec<Holding>,
    /// What the aggregator returns on the next sync.
    staged_transactions: Vec<Transaction>,
    staged_holdings: Vec<Holding>,
    failing: HashSet<&'static str>,
    calls: Vec<&'static str>,
    next_id: u64,
}

impl Inner {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    inner: Mutex<Inner>,
}

fn not_found(op: &str, detail: String) -> ApiError {
    ApiError::Status {
        endpoint: op.to_string(),
        status: StatusCode::NOT_FOUND,
        detail,
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call to `op` fail with a 500.
    pub fn fail_on(&self, op: &'static str) {
        self.lock().failing.insert(op);
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn server_state(&self) -> Option<OnboardingState> {
        self.lock().onboarding.clone()
    }

    pub fn seed_asset(&self, category: AssetCategory, name: &str, value: Decimal) -> Asset {
        let mut inner = self.lock();
        let now = Utc::now();
        let asset = Asset {
            id: inner.id("asset"),
            category,
            name: name.into(),
            value,
            connected_account_id: None,
            is_connected: false,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.assets.push(asset.clone());
        asset
    }

    pub fn seed_account(&self, name: &str, error: Option<&str>, active: bool) -> ConnectedAccount {
        let mut inner = self.lock();
        let account = ConnectedAccount {
            id: inner.id("acct"),
            institution_name: "First Platypus Bank".into(),
            account_name: name.into(),
            account_type: "depository".into(),
            account_subtype: Some("checking".into()),
            is_active: active,
            last_synced_at: None,
            last_sync_error: error.map(String::from),
            created_at: Utc::now(),
        };
        inner.accounts.push(account.clone());
        account
    }

    /// Accounts the next token exchange returns (and connects).
    pub fn set_exchange_accounts(&self, accounts: Vec<PlaidAccountInfo>) {
        self.lock().exchange_accounts = accounts;
    }

    /// Make the next link report a partial success with this sync error.
    pub fn set_partial_link(&self, error: &str) {
        self.lock().partial_link = Some(error.into());
    }

    pub fn seed_transaction(
        &self,
        account_id: &str,
        name: &str,
        amount: Decimal,
        date: NaiveDate,
    ) -> Transaction {
        let mut inner = self.lock();
        let tx = new_transaction(&mut inner, account_id, name, amount, date);
        inner.transactions.push(tx.clone());
        tx
    }

    /// A transaction the next sync of its account pulls in.
    pub fn stage_transaction(&self, account_id: &str, name: &str, amount: Decimal, date: NaiveDate) {
        let mut inner = self.lock();
        let tx = new_transaction(&mut inner, account_id, name, amount, date);
        inner.staged_transactions.push(tx);
    }

    /// A position the next holdings sync of its account reports.
    pub fn stage_holding(&self, account_id: &str, ticker: &str, quantity: Decimal, price: Decimal) {
        let mut inner = self.lock();
        let now = Utc::now();
        let security_id = inner.id("sec");
        let holding = Holding {
            id: inner.id("holding"),
            connected_account_id: account_id.into(),
            security_id: security_id.clone(),
            security: Some(Security {
                id: security_id,
                plaid_security_id: format!("plaid-{ticker}"),
                name: ticker.into(),
                ticker_symbol: Some(ticker.into()),
                is_cash_equivalent: false,
                security_type: Some("etf".into()),
                close_price: Some(price),
                close_price_as_of: None,
                iso_currency_code: Some("USD".into()),
            }),
            institution_price: price,
            institution_price_as_of: None,
            institution_value: price * quantity,
            cost_basis: None,
            quantity,
            iso_currency_code: Some("USD".into()),
            created_at: now,
            updated_at: now,
        };
        inner.staged_holdings.push(holding);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call, then fail if `op` is marked failing.
    fn enter(&self, op: &'static str) -> Result<std::sync::MutexGuard<'_, Inner>, ApiError> {
        let mut inner = self.lock();
        inner.calls.push(op);
        if inner.failing.contains(op) {
            return Err(ApiError::Status {
                endpoint: op.to_string(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: "injected failure".into(),
            });
        }
        Ok(inner)
    }
}

fn fresh_state() -> OnboardingState {
    let now = Utc::now();
    OnboardingState {
        id: "default".into(),
        current_step_id: "welcome".into(),
        household_type: None,
        answers: Default::default(),
        tasks: Vec::new(),
        completed_task_ids: Vec::new(),
        is_complete: false,
        answer_tasks: Default::default(),
        created_at: now,
        updated_at: now,
    }
}

fn state_mut(inner: &mut Inner) -> &mut OnboardingState {
    inner.onboarding.get_or_insert_with(fresh_state)
}

fn new_transaction(
    inner: &mut Inner,
    account_id: &str,
    name: &str,
    amount: Decimal,
    date: NaiveDate,
) -> Transaction {
    let now = Utc::now();
    let id = inner.id("txn");
    Transaction {
        plaid_transaction_id: format!("plaid-{id}"),
        id,
        connected_account_id: account_id.into(),
        amount,
        iso_currency_code: Some("USD".into()),
        date,
        authorized_date: None,
        name: name.into(),
        merchant_name: None,
        category_primary: None,
        category_detailed: None,
        payment_channel: None,
        pending: false,
        location_city: None,
        location_region: None,
        location_country: None,
        user_category: None,
        user_notes: None,
        created_at: now,
        updated_at: now,
    }
}

/// Newest first, filtered and paged like the backend.
fn page_of<'a>(
    transactions: impl Iterator<Item = &'a Transaction>,
    query: &TransactionQuery,
) -> TransactionList {
    let mut matching: Vec<Transaction> = transactions
        .filter(|t| query.start_date.is_none_or(|d| t.date >= d))
        .filter(|t| query.end_date.is_none_or(|d| t.date <= d))
        .cloned()
        .collect();
    matching.sort_by(|a, b| b.date.cmp(&a.date));
    let limit = query.limit.unwrap_or(DEFAULT_TRANSACTION_PAGE);
    let offset = query.offset();
    TransactionList {
        total: matching.len() as u64,
        transactions: matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect(),
        limit,
        offset,
    }
}

/// Move staged transactions for `account_id` into the ledger. Returns how many.
fn pull_staged(inner: &mut Inner, account_id: &str) -> u32 {
    let (pulled, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.staged_transactions)
        .into_iter()
        .partition(|t| t.connected_account_id == account_id);
    inner.staged_transactions = rest;
    let added = pulled.len() as u32;
    inner.transactions.extend(pulled);
    added
}

#[async_trait]
impl OnboardingApi for FakeBackend {
    async fn get_state(&self) -> Result<OnboardingState, ApiError> {
        let mut inner = self.enter("get_state")?;
        Ok(state_mut(&mut inner).clone())
    }

    async fn get_status(&self) -> Result<OnboardingStatus, ApiError> {
        let inner = self.enter("get_status")?;
        Ok(OnboardingStatus {
            is_complete: inner.onboarding.as_ref().is_some_and(|s| s.is_complete),
        })
    }

    async fn get_progress(&self) -> Result<Progress, ApiError> {
        let inner = self.enter("get_progress")?;
        Ok(engine::progress(
            inner.onboarding.as_ref().map(|s| s.current_step_id.as_str()),
        ))
    }

    async fn answer(&self, request: &AnswerRequest) -> Result<AnswerResponse, ApiError> {
        let mut inner = self.enter("answer")?;
        let record = AnswerRecord::new(request.answer.clone(), request.count, request.counts.clone());
        let templates = engine::expand_record(request.question_id, &record);

        let mut generated = Vec::new();
        for template in templates {
            let id = inner.id("task");
            let mut task = template.into_placeholder(id, request.question_id);
            task.pending = false;
            task.source_question = None;
            generated.push(task);
        }

        let next = request.question_id.next().map(|q| q.to_string());
        let state = state_mut(&mut inner);
        state.answers.insert(request.question_id.to_string(), record);
        state.tasks.extend(generated.iter().cloned());
        if let Some(next) = &next {
            state.current_step_id = next.clone();
        }

        Ok(AnswerResponse {
            next_question_id: next,
            tasks_generated: generated,
        })
    }

    async fn set_household(&self, household_type: HouseholdType) -> Result<(), ApiError> {
        let mut inner = self.enter("set_household")?;
        state_mut(&mut inner).household_type = Some(household_type);
        Ok(())
    }

    async fn complete_task(
        &self,
        request: &TaskCompleteRequest,
    ) -> Result<TaskCompleteResponse, ApiError> {
        let mut inner = self.enter("complete_task")?;
        let task = inner
            .onboarding
            .as_ref()
            .and_then(|s| s.task(&request.task_id).cloned())
            .ok_or_else(|| not_found("complete_task", format!("Task {} not found", request.task_id)))?;

        let now = Utc::now();
        let entity_id = match task.entity {
            EntityKind::Asset => {
                let id = inner.id("asset");
                inner.assets.push(Asset {
                    id: id.clone(),
                    category: task.category.parse().unwrap_or(AssetCategory::Other),
                    name: request.name.clone(),
                    value: request.value,
                    connected_account_id: None,
                    is_connected: false,
                    last_synced_at: None,
                    created_at: now,
                    updated_at: now,
                });
                id
            }
            EntityKind::Liability => {
                let id = inner.id("liability");
                inner.liabilities.push(Liability {
                    id: id.clone(),
                    category: task.category.parse().unwrap_or(LiabilityCategory::Other),
                    name: request.name.clone(),
                    balance: request.value,
                    interest_rate: request.interest_rate,
                    connected_account_id: None,
                    is_connected: false,
                    last_synced_at: None,
                    created_at: now,
                    updated_at: now,
                });
                id
            }
        };
        state_mut(&mut inner).resolve_task(&request.task_id, Some(entity_id.clone()));

        Ok(TaskCompleteResponse {
            status: "ok".into(),
            entity_id,
        })
    }

    async fn skip_task(&self, task_id: &str) -> Result<(), ApiError> {
        let mut inner = self.enter("skip_task")?;
        state_mut(&mut inner).resolve_task(task_id, None);
        Ok(())
    }

    async fn complete(&self) -> Result<(), ApiError> {
        let mut inner = self.enter("complete")?;
        state_mut(&mut inner).is_complete = true;
        Ok(())
    }

    async fn go_to_step(&self, step_id: &str) -> Result<(), ApiError> {
        let mut inner = self.enter("go_to_step")?;
        state_mut(&mut inner).current_step_id = step_id.to_string();
        Ok(())
    }

    async fn reset(&self) -> Result<(), ApiError> {
        let mut inner = self.enter("reset")?;
        inner.assets.clear();
        inner.liabilities.clear();
        inner.onboarding = Some(fresh_state());
        Ok(())
    }
}

fn breakdown<'a>(
    entries: impl Iterator<Item = (String, &'static str, &'static str, Decimal)> + 'a,
    total: Decimal,
) -> Vec<CategoryBreakdown> {
    let mut out: Vec<CategoryBreakdown> = Vec::new();
    for (category, label, color, value) in entries {
        match out.iter_mut().find(|b| b.category == category) {
            Some(b) => b.value += value,
            None => out.push(CategoryBreakdown {
                category,
                label: label.into(),
                value,
                percentage: 0.0,
                color: color.into(),
            }),
        }
    }
    for b in &mut out {
        if !total.is_zero() {
            let pct = (b.value / total * Decimal::ONE_HUNDRED).round_dp(1);
            b.percentage = pct.to_string().parse().unwrap_or(0.0);
        }
    }
    out
}

#[async_trait]
impl NetWorthApi for FakeBackend {
    async fn list_assets(&self) -> Result<Vec<Asset>, ApiError> {
        Ok(self.enter("list_assets")?.assets.clone())
    }

    async fn get_asset(&self, id: &str) -> Result<Asset, ApiError> {
        let inner = self.enter("get_asset")?;
        inner
            .assets
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| not_found("get_asset", format!("Asset {id} not found")))
    }

    async fn assets_by_category(&self, category: AssetCategory) -> Result<Vec<Asset>, ApiError> {
        let inner = self.enter("assets_by_category")?;
        Ok(inner.assets.iter().filter(|a| a.category == category).cloned().collect())
    }

    async fn create_asset(&self, new: &NewAsset) -> Result<Asset, ApiError> {
        let mut inner = self.enter("create_asset")?;
        let asset = new.placeholder(inner.id("asset"));
        inner.assets.push(asset.clone());
        Ok(asset)
    }

    async fn update_asset(&self, id: &str, update: &AssetUpdate) -> Result<Asset, ApiError> {
        let mut inner = self.enter("update_asset")?;
        let asset = inner
            .assets
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found("update_asset", format!("Asset {id} not found")))?;
        update.apply_to(asset);
        Ok(asset.clone())
    }

    async fn delete_asset(&self, id: &str) -> Result<(), ApiError> {
        let mut inner = self.enter("delete_asset")?;
        let before = inner.assets.len();
        inner.assets.retain(|a| a.id != id);
        if inner.assets.len() == before {
            return Err(not_found("delete_asset", format!("Asset {id} not found")));
        }
        Ok(())
    }

    async fn list_liabilities(&self) -> Result<Vec<Liability>, ApiError> {
        Ok(self.enter("list_liabilities")?.liabilities.clone())
    }

    async fn get_liability(&self, id: &str) -> Result<Liability, ApiError> {
        let inner = self.enter("get_liability")?;
        inner
            .liabilities
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| not_found("get_liability", format!("Liability {id} not found")))
    }

    async fn liabilities_by_category(
        &self,
        category: LiabilityCategory,
    ) -> Result<Vec<Liability>, ApiError> {
        let inner = self.enter("liabilities_by_category")?;
        Ok(inner
            .liabilities
            .iter()
            .filter(|l| l.category == category)
            .cloned()
            .collect())
    }

    async fn create_liability(&self, new: &NewLiability) -> Result<Liability, ApiError> {
        let mut inner = self.enter("create_liability")?;
        let liability = new.placeholder(inner.id("liability"));
        inner.liabilities.push(liability.clone());
        Ok(liability)
    }

    async fn update_liability(
        &self,
        id: &str,
        update: &LiabilityUpdate,
    ) -> Result<Liability, ApiError> {
        let mut inner = self.enter("update_liability")?;
        let liability = inner
            .liabilities
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| not_found("update_liability", format!("Liability {id} not found")))?;
        update.apply_to(liability);
        Ok(liability.clone())
    }

    async fn delete_liability(&self, id: &str) -> Result<(), ApiError> {
        let mut inner = self.enter("delete_liability")?;
        let before = inner.liabilities.len();
        inner.liabilities.retain(|l| l.id != id);
        if inner.liabilities.len() == before {
            return Err(not_found("delete_liability", format!("Liability {id} not found")));
        }
        Ok(())
    }

    async fn net_worth(&self) -> Result<NetWorthSummary, ApiError> {
        let inner = self.enter("net_worth")?;
        let total_assets: Decimal = inner.assets.iter().map(|a| a.value).sum();
        let total_liabilities: Decimal = inner.liabilities.iter().map(|l| l.balance).sum();

        let asset_breakdown = breakdown(
            inner
                .assets
                .iter()
                .map(|a| (a.category.to_string(), a.category.label(), a.category.color(), a.value)),
            total_assets,
        );
        let liability_breakdown = breakdown(
            inner.liabilities.iter().map(|l| {
                (l.category.to_string(), l.category.label(), l.category.color(), l.balance)
            }),
            total_liabilities,
        );

        Ok(NetWorthSummary {
            total_assets,
            total_liabilities,
            net_worth: total_assets - total_liabilities,
            assets_by_category: Default::default(),
            liabilities_by_category: Default::default(),
            asset_breakdown,
            liability_breakdown,
            last_updated: Utc::now(),
        })
    }
}

#[async_trait]
impl BankLinkApi for FakeBackend {
    async fn create_link_token(&self) -> Result<LinkToken, ApiError> {
        let mut inner = self.enter("create_link_token")?;
        let id = inner.id("link-sandbox");
        Ok(LinkToken::new(id))
    }

    async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> Result<Vec<PlaidAccountInfo>, ApiError> {
        let mut inner = self.enter("exchange_public_token")?;
        if public_token.is_empty() {
            return Err(ApiError::Status {
                endpoint: "exchange_public_token".into(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: "Failed to exchange token: INVALID_PUBLIC_TOKEN".into(),
            });
        }
        let infos = std::mem::take(&mut inner.exchange_accounts);
        for info in &infos {
            inner.accounts.push(ConnectedAccount {
                id: info.account_id.clone(),
                institution_name: "First Platypus Bank".into(),
                account_name: info.name.clone(),
                account_type: info.account_type.clone(),
                account_subtype: info.subtype.clone(),
                is_active: true,
                last_synced_at: None,
                last_sync_error: None,
                created_at: Utc::now(),
            });
        }
        Ok(infos)
    }

    async fn list_accounts(&self) -> Result<Vec<ConnectedAccount>, ApiError> {
        Ok(self.enter("list_accounts")?.accounts.clone())
    }

    async fn sync_all(&self) -> Result<SyncResponse, ApiError> {
        let mut inner = self.enter("sync_all")?;
        let now = Utc::now();
        let mut successful = 0;
        for account in inner.accounts.iter_mut().filter(|a| a.is_active) {
            account.last_synced_at = Some(now);
            account.last_sync_error = None;
            successful += 1;
        }
        Ok(SyncResponse {
            success: true,
            message: format!("Synced {successful}/{successful} accounts"),
            total: Some(successful),
            successful: Some(successful),
            failed: Some(0),
            errors: None,
        })
    }

    async fn sync_account(&self, id: &str) -> Result<SyncResponse, ApiError> {
        let mut inner = self.enter("sync_account")?;
        match inner.accounts.iter_mut().find(|a| a.id == id) {
            Some(account) => {
                account.last_synced_at = Some(Utc::now());
                account.last_sync_error = None;
                Ok(SyncResponse {
                    success: true,
                    message: "Account synced successfully".into(),
                    total: None,
                    successful: None,
                    failed: None,
                    errors: None,
                })
            }
            None => Ok(SyncResponse {
                success: false,
                message: "Connected account not found".into(),
                total: None,
                successful: None,
                failed: None,
                errors: None,
            }),
        }
    }

    async fn link_account(&self, id: &str, entity: &LinkEntity) -> Result<LinkOutcome, ApiError> {
        let mut inner = self.enter("link_account")?;
        if !inner.accounts.iter().any(|a| a.id == id) {
            return Err(not_found("link_account", "Connected account not found".into()));
        }
        match entity.entity_type {
            EntityKind::Asset => {
                let asset = inner
                    .assets
                    .iter_mut()
                    .find(|a| a.id == entity.entity_id)
                    .ok_or_else(|| not_found("link_account", "Asset not found".into()))?;
                asset.connected_account_id = Some(id.to_string());
                asset.is_connected = true;
            }
            EntityKind::Liability => {
                let liability = inner
                    .liabilities
                    .iter_mut()
                    .find(|l| l.id == entity.entity_id)
                    .ok_or_else(|| not_found("link_account", "Liability not found".into()))?;
                liability.connected_account_id = Some(id.to_string());
                liability.is_connected = true;
            }
        }
        Ok(match inner.partial_link.take() {
            Some(error) => LinkOutcome {
                status: LinkStatus::Partial,
                message: format!("Account linked but sync failed: {error}"),
                sync_error: Some(error),
            },
            None => LinkOutcome {
                status: LinkStatus::Ok,
                message: "Account linked and synced successfully".into(),
                sync_error: None,
            },
        })
    }

    async fn disconnect(&self, id: &str) -> Result<(), ApiError> {
        let mut inner = self.enter("disconnect")?;
        let account = inner
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found("disconnect", "Connected account not found".into()))?;
        account.is_active = false;
        for asset in inner.assets.iter_mut().filter(|a| a.connected_account_id.as_deref() == Some(id)) {
            asset.connected_account_id = None;
            asset.is_connected = false;
        }
        Ok(())
    }

    async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<TransactionList, ApiError> {
        let inner = self.enter("list_transactions")?;
        Ok(page_of(inner.transactions.iter(), query))
    }

    async fn account_transactions(
        &self,
        account_id: &str,
        query: &TransactionQuery,
    ) -> Result<TransactionList, ApiError> {
        let inner = self.enter("account_transactions")?;
        if !inner.accounts.iter().any(|a| a.id == account_id) {
            return Err(not_found("account_transactions", "Connected account not found".into()));
        }
        Ok(page_of(
            inner
                .transactions
                .iter()
                .filter(|t| t.connected_account_id == account_id),
            query,
        ))
    }

    async fn sync_transactions(&self) -> Result<TransactionSyncAllResponse, ApiError> {
        let mut inner = self.enter("sync_transactions")?;
        let active: Vec<String> = inner
            .accounts
            .iter()
            .filter(|a| a.is_active)
            .map(|a| a.id.clone())
            .collect();
        let total_added = active.iter().map(|id| pull_staged(&mut inner, id)).sum();
        let total = active.len() as u32;
        Ok(TransactionSyncAllResponse {
            success: true,
            message: format!("Synced {total}/{total} accounts"),
            total_accounts: total,
            successful: total,
            failed: 0,
            total_added,
            total_modified: 0,
            total_removed: 0,
            errors: None,
        })
    }

    async fn sync_account_transactions(
        &self,
        account_id: &str,
    ) -> Result<TransactionSyncResponse, ApiError> {
        let mut inner = self.enter("sync_account_transactions")?;
        let active = inner
            .accounts
            .iter()
            .find(|a| a.id == account_id)
            .map(|a| a.is_active);
        Ok(match active {
            None => return Err(not_found("sync_account_transactions", "Connected account not found".into())),
            Some(false) => TransactionSyncResponse {
                success: false,
                message: "Account is not active".into(),
                added: 0,
                modified: 0,
                removed: 0,
            },
            Some(true) => TransactionSyncResponse {
                success: true,
                message: "Transactions synced successfully".into(),
                added: pull_staged(&mut inner, account_id),
                modified: 0,
                removed: 0,
            },
        })
    }

    async fn account_holdings(&self, account_id: &str) -> Result<HoldingList, ApiError> {
        let inner = self.enter("account_holdings")?;
        if !inner.accounts.iter().any(|a| a.id == account_id) {
            return Err(not_found("account_holdings", "Connected account not found".into()));
        }
        let holdings: Vec<Holding> = inner
            .holdings
            .iter()
            .filter(|h| h.connected_account_id == account_id)
            .cloned()
            .collect();
        Ok(HoldingList {
            total: holdings.len() as u64,
            holdings,
        })
    }

    async fn sync_holdings(&self, account_id: &str) -> Result<HoldingSyncResponse, ApiError> {
        let mut inner = self.enter("sync_holdings")?;
        if !inner.accounts.iter().any(|a| a.id == account_id && a.is_active) {
            return Ok(HoldingSyncResponse {
                success: false,
                message: "Connected account not found".into(),
                added: 0,
                securities: 0,
            });
        }
        // Full refresh: the account's positions are replaced wholesale.
        let (fresh, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.staged_holdings)
            .into_iter()
            .partition(|h| h.connected_account_id == account_id);
        inner.staged_holdings = rest;
        inner.holdings.retain(|h| h.connected_account_id != account_id);
        let added = fresh.len() as u32;
        inner.holdings.extend(fresh);
        if let Some(account) = inner.accounts.iter_mut().find(|a| a.id == account_id) {
            account.last_synced_at = Some(Utc::now());
            account.last_sync_error = None;
        }
        Ok(HoldingSyncResponse {
            success: true,
            message: "Holdings synced successfully".into(),
            added,
            securities: added,
        })
    }
}
