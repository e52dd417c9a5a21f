//! HTTP implementation of the backend API traits.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{BankLinkApi, NetWorthApi, OnboardingApi};
use crate::bank_link::activity::{
    HoldingList, HoldingSyncResponse, TransactionList, TransactionQuery,
    TransactionSyncAllResponse, TransactionSyncResponse,
};
use crate::bank_link::model::{
    ConnectedAccount, ConnectedAccountList, LinkEntity, LinkOutcome, LinkToken, PlaidAccountInfo,
    SyncResponse,
};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::net_worth::model::{
    Asset, AssetCategory, AssetUpdate, Liability, LiabilityCategory, LiabilityUpdate,
    NetWorthSummary, NewAsset, NewLiability,
};
use crate::onboarding::model::{
    AnswerRequest, AnswerResponse, HouseholdType, OnboardingState, OnboardingStatus, Progress,
    TaskCompleteRequest, TaskCompleteResponse,
};

/// Response of `GET /health`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Health {
    pub status: String,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// reqwest-backed client for the You Can FI backend.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<SecretString>,
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.auth_token.is_some())
            .finish()
    }
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Url::parse(&config.api_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.api_url)))?;

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ApiError::Transport {
                endpoint: config.api_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{path}", self.base_url));
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send and decode a JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.execute(endpoint, builder).await?;
        let bytes = response.bytes().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    /// Send and ignore any body (204s and `{"status": "ok"}` acks).
    async fn send_empty(&self, endpoint: &str, builder: RequestBuilder) -> Result<(), ApiError> {
        self.execute(endpoint, builder).await.map(|_| ())
    }

    async fn execute(
        &self,
        endpoint: &str,
        builder: RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        tracing::debug!(endpoint, "Backend request");
        let response = builder.send().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(status, &body);
        tracing::debug!(endpoint, status = %status, detail = %detail, "Backend error");
        Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status,
            detail,
        })
    }

    /// `GET /health`, resolved against the server root rather than the API prefix.
    pub async fn health(&self) -> Result<Health, ApiError> {
        let url = Url::parse(&self.base_url)
            .and_then(|u| u.join("/health"))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        self.send("GET /health", self.client.get(url)).await
    }
}

/// Pull FastAPI's `detail` out of an error body, falling back to the raw
/// text or the status reason.
fn error_detail(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => match json.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}

#[async_trait]
impl OnboardingApi for HttpApi {
    async fn get_state(&self) -> Result<OnboardingState, ApiError> {
        self.send("GET /onboarding", self.request(Method::GET, "/onboarding"))
            .await
    }

    async fn get_status(&self) -> Result<OnboardingStatus, ApiError> {
        self.send(
            "GET /onboarding/status",
            self.request(Method::GET, "/onboarding/status"),
        )
        .await
    }

    async fn get_progress(&self) -> Result<Progress, ApiError> {
        self.send(
            "GET /onboarding/progress",
            self.request(Method::GET, "/onboarding/progress"),
        )
        .await
    }

    async fn answer(&self, request: &AnswerRequest) -> Result<AnswerResponse, ApiError> {
        self.send(
            "POST /onboarding/answer",
            self.request(Method::POST, "/onboarding/answer").json(request),
        )
        .await
    }

    async fn set_household(&self, household_type: HouseholdType) -> Result<(), ApiError> {
        let body = serde_json::json!({ "household_type": household_type });
        self.send_empty(
            "POST /onboarding/household",
            self.request(Method::POST, "/onboarding/household").json(&body),
        )
        .await
    }

    async fn complete_task(
        &self,
        request: &TaskCompleteRequest,
    ) -> Result<TaskCompleteResponse, ApiError> {
        self.send(
            "POST /onboarding/task/complete",
            self.request(Method::POST, "/onboarding/task/complete").json(request),
        )
        .await
    }

    async fn skip_task(&self, task_id: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "task_id": task_id });
        self.send_empty(
            "POST /onboarding/task/skip",
            self.request(Method::POST, "/onboarding/task/skip").json(&body),
        )
        .await
    }

    async fn complete(&self) -> Result<(), ApiError> {
        self.send_empty(
            "POST /onboarding/complete",
            self.request(Method::POST, "/onboarding/complete"),
        )
        .await
    }

    async fn go_to_step(&self, step_id: &str) -> Result<(), ApiError> {
        self.send_empty(
            "POST /onboarding/go-to-step",
            self.request(Method::POST, "/onboarding/go-to-step")
                .query(&[("step_id", step_id)]),
        )
        .await
    }

    async fn reset(&self) -> Result<(), ApiError> {
        self.send_empty(
            "DELETE /onboarding/reset",
            self.request(Method::DELETE, "/onboarding/reset"),
        )
        .await
    }
}

#[async_trait]
impl NetWorthApi for HttpApi {
    async fn list_assets(&self) -> Result<Vec<Asset>, ApiError> {
        self.send("GET /assets/", self.request(Method::GET, "/assets/"))
            .await
    }

    async fn get_asset(&self, id: &str) -> Result<Asset, ApiError> {
        let path = format!("/assets/{id}");
        self.send(&format!("GET {path}"), self.request(Method::GET, &path))
            .await
    }

    async fn assets_by_category(&self, category: AssetCategory) -> Result<Vec<Asset>, ApiError> {
        let path = format!("/assets/category/{category}");
        self.send(&format!("GET {path}"), self.request(Method::GET, &path))
            .await
    }

    async fn create_asset(&self, new: &NewAsset) -> Result<Asset, ApiError> {
        self.send(
            "POST /assets/",
            self.request(Method::POST, "/assets/").json(new),
        )
        .await
    }

    async fn update_asset(&self, id: &str, update: &AssetUpdate) -> Result<Asset, ApiError> {
        let path = format!("/assets/{id}");
        self.send(
            &format!("PUT {path}"),
            self.request(Method::PUT, &path).json(update),
        )
        .await
    }

    async fn delete_asset(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/assets/{id}");
        self.send_empty(&format!("DELETE {path}"), self.request(Method::DELETE, &path))
            .await
    }

    async fn list_liabilities(&self) -> Result<Vec<Liability>, ApiError> {
        self.send("GET /liabilities/", self.request(Method::GET, "/liabilities/"))
            .await
    }

    async fn get_liability(&self, id: &str) -> Result<Liability, ApiError> {
        let path = format!("/liabilities/{id}");
        self.send(&format!("GET {path}"), self.request(Method::GET, &path))
            .await
    }

    async fn liabilities_by_category(
        &self,
        category: LiabilityCategory,
    ) -> Result<Vec<Liability>, ApiError> {
        let path = format!("/liabilities/category/{category}");
        self.send(&format!("GET {path}"), self.request(Method::GET, &path))
            .await
    }

    async fn create_liability(&self, new: &NewLiability) -> Result<Liability, ApiError> {
        self.send(
            "POST /liabilities/",
            self.request(Method::POST, "/liabilities/").json(new),
        )
        .await
    }

    async fn update_liability(
        &self,
        id: &str,
        update: &LiabilityUpdate,
    ) -> Result<Liability, ApiError> {
        let path = format!("/liabilities/{id}");
        self.send(
            &format!("PUT {path}"),
            self.request(Method::PUT, &path).json(update),
        )
        .await
    }

    async fn delete_liability(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/liabilities/{id}");
        self.send_empty(&format!("DELETE {path}"), self.request(Method::DELETE, &path))
            .await
    }

    async fn net_worth(&self) -> Result<NetWorthSummary, ApiError> {
        self.send("GET /net-worth/", self.request(Method::GET, "/net-worth/"))
            .await
    }
}

#[async_trait]
impl BankLinkApi for HttpApi {
    async fn create_link_token(&self) -> Result<LinkToken, ApiError> {
        self.send(
            "POST /plaid/link-token",
            self.request(Method::POST, "/plaid/link-token"),
        )
        .await
    }

    async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> Result<Vec<PlaidAccountInfo>, ApiError> {
        let body = serde_json::json!({ "public_token": public_token });
        self.send(
            "POST /plaid/exchange-token",
            self.request(Method::POST, "/plaid/exchange-token").json(&body),
        )
        .await
    }

    async fn list_accounts(&self) -> Result<Vec<ConnectedAccount>, ApiError> {
        let list: ConnectedAccountList = self
            .send("GET /plaid/accounts", self.request(Method::GET, "/plaid/accounts"))
            .await?;
        Ok(list.accounts)
    }

    async fn sync_all(&self) -> Result<SyncResponse, ApiError> {
        self.send("POST /plaid/sync", self.request(Method::POST, "/plaid/sync"))
            .await
    }

    async fn sync_account(&self, id: &str) -> Result<SyncResponse, ApiError> {
        let path = format!("/plaid/accounts/{id}/sync");
        self.send(&format!("POST {path}"), self.request(Method::POST, &path))
            .await
    }

    async fn link_account(&self, id: &str, entity: &LinkEntity) -> Result<LinkOutcome, ApiError> {
        let path = format!("/plaid/accounts/{id}/link");
        self.send(
            &format!("POST {path}"),
            self.request(Method::POST, &path).json(entity),
        )
        .await
    }

    async fn disconnect(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/plaid/accounts/{id}");
        self.send_empty(&format!("DELETE {path}"), self.request(Method::DELETE, &path))
            .await
    }

    async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<TransactionList, ApiError> {
        self.send(
            "GET /transactions/",
            self.request(Method::GET, "/transactions/").query(query),
        )
        .await
    }

    async fn account_transactions(
        &self,
        account_id: &str,
        query: &TransactionQuery,
    ) -> Result<TransactionList, ApiError> {
        let path = format!("/transactions/account/{account_id}");
        self.send(
            &format!("GET {path}"),
            self.request(Method::GET, &path).query(query),
        )
        .await
    }

    async fn sync_transactions(&self) -> Result<TransactionSyncAllResponse, ApiError> {
        self.send(
            "POST /transactions/sync",
            self.request(Method::POST, "/transactions/sync"),
        )
        .await
    }

    async fn sync_account_transactions(
        &self,
        account_id: &str,
    ) -> Result<TransactionSyncResponse, ApiError> {
        let path = format!("/transactions/sync/{account_id}");
        self.send(&format!("POST {path}"), self.request(Method::POST, &path))
            .await
    }

    async fn account_holdings(&self, account_id: &str) -> Result<HoldingList, ApiError> {
        let path = format!("/holdings/account/{account_id}");
        self.send(&format!("GET {path}"), self.request(Method::GET, &path))
            .await
    }

    async fn sync_holdings(&self, account_id: &str) -> Result<HoldingSyncResponse, ApiError> {
        let path = format!("/holdings/sync/{account_id}");
        self.send(&format!("POST {path}"), self.request(Method::POST, &path))
            .await
    }
}
