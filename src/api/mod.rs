//! Remote backend API: the traits each store talks through.
//!
//! `HttpApi` implements all three over HTTP. Tests substitute in-memory
//! fakes.

#[cfg(test)]
pub(crate) mod fake;
pub mod http;

use async_trait::async_trait;

use crate::bank_link::activity::{
    HoldingList, HoldingSyncResponse, TransactionList, TransactionQuery,
    TransactionSyncAllResponse, TransactionSyncResponse,
};
use crate::bank_link::model::{
    ConnectedAccount, LinkEntity, LinkOutcome, LinkToken, PlaidAccountInfo, SyncResponse,
};
use crate::error::ApiError;
use crate::net_worth::model::{
    Asset, AssetCategory, AssetUpdate, Liability, LiabilityCategory, LiabilityUpdate,
    NetWorthSummary, NewAsset, NewLiability,
};
use crate::onboarding::model::{
    AnswerRequest, AnswerResponse, HouseholdType, OnboardingState, OnboardingStatus, Progress,
    TaskCompleteRequest, TaskCompleteResponse,
};

pub use http::HttpApi;

/// `/onboarding` endpoints.
#[async_trait]
pub trait OnboardingApi: Send + Sync {
    /// Fetch the state, creating it server-side if absent.
    async fn get_state(&self) -> Result<OnboardingState, ApiError>;

    async fn get_status(&self) -> Result<OnboardingStatus, ApiError>;

    async fn get_progress(&self) -> Result<Progress, ApiError>;

    async fn answer(&self, request: &AnswerRequest) -> Result<AnswerResponse, ApiError>;

    async fn set_household(&self, household_type: HouseholdType) -> Result<(), ApiError>;

    async fn complete_task(
        &self,
        request: &TaskCompleteRequest,
    ) -> Result<TaskCompleteResponse, ApiError>;

    async fn skip_task(&self, task_id: &str) -> Result<(), ApiError>;

    async fn complete(&self) -> Result<(), ApiError>;

    async fn go_to_step(&self, step_id: &str) -> Result<(), ApiError>;

    /// Reset onboarding. Also deletes the user's assets and liabilities.
    async fn reset(&self) -> Result<(), ApiError>;
}

/// `/assets`, `/liabilities` and `/net-worth` endpoints.
#[async_trait]
pub trait NetWorthApi: Send + Sync {
    async fn list_assets(&self) -> Result<Vec<Asset>, ApiError>;

    async fn get_asset(&self, id: &str) -> Result<Asset, ApiError>;

    async fn assets_by_category(&self, category: AssetCategory) -> Result<Vec<Asset>, ApiError>;

    async fn create_asset(&self, new: &NewAsset) -> Result<Asset, ApiError>;

    async fn update_asset(&self, id: &str, update: &AssetUpdate) -> Result<Asset, ApiError>;

    async fn delete_asset(&self, id: &str) -> Result<(), ApiError>;

    async fn list_liabilities(&self) -> Result<Vec<Liability>, ApiError>;

    async fn get_liability(&self, id: &str) -> Result<Liability, ApiError>;

    async fn liabilities_by_category(
        &self,
        category: LiabilityCategory,
    ) -> Result<Vec<Liability>, ApiError>;

    async fn create_liability(&self, new: &NewLiability) -> Result<Liability, ApiError>;

    async fn update_liability(
        &self,
        id: &str,
        update: &LiabilityUpdate,
    ) -> Result<Liability, ApiError>;

    async fn delete_liability(&self, id: &str) -> Result<(), ApiError>;

    async fn net_worth(&self) -> Result<NetWorthSummary, ApiError>;
}

/// `/plaid` endpoints (the backend's aggregator proxy), plus the
/// `/transactions` and `/holdings` data pulled through it.
#[async_trait]
pub trait BankLinkApi: Send + Sync {
    async fn create_link_token(&self) -> Result<LinkToken, ApiError>;

    async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> Result<Vec<PlaidAccountInfo>, ApiError>;

    async fn list_accounts(&self) -> Result<Vec<ConnectedAccount>, ApiError>;

    async fn sync_all(&self) -> Result<SyncResponse, ApiError>;

    async fn sync_account(&self, id: &str) -> Result<SyncResponse, ApiError>;

    async fn link_account(&self, id: &str, entity: &LinkEntity) -> Result<LinkOutcome, ApiError>;

    async fn disconnect(&self, id: &str) -> Result<(), ApiError>;

    /// Newest first, across every account.
    async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<TransactionList, ApiError>;

    async fn account_transactions(
        &self,
        account_id: &str,
        query: &TransactionQuery,
    ) -> Result<TransactionList, ApiError>;

    async fn sync_transactions(&self) -> Result<TransactionSyncAllResponse, ApiError>;

    async fn sync_account_transactions(
        &self,
        account_id: &str,
    ) -> Result<TransactionSyncResponse, ApiError>;

    async fn account_holdings(&self, account_id: &str) -> Result<HoldingList, ApiError>;

    async fn sync_holdings(&self, account_id: &str) -> Result<HoldingSyncResponse, ApiError>;
}
