//! FinanceClient: the three stores wired to one API client and one cache.
//!
//! Cross-store effects live here: anything that makes the backend create,
//! delete or re-balance assets and liabilities is followed by a net-worth
//! refresh.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::api::{BankLinkApi, HttpApi, NetWorthApi, OnboardingApi};
use crate::bank_link::BankLinkStore;
use crate::bank_link::model::{LinkEntity, LinkOutcome, SyncResponse};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::net_worth::NetWorthStore;
use crate::onboarding::model::Answer;
use crate::onboarding::questions::QuestionId;
use crate::onboarding::store::{AnswerOutcome, OnboardingStore};
use crate::store::{Cache, LibSqlCache};

/// What `hydrate_all` found in the local cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hydrated {
    pub onboarding: bool,
    pub net_worth: bool,
    pub bank_link: bool,
}

pub struct FinanceClient {
    pub onboarding: Arc<OnboardingStore>,
    pub net_worth: Arc<NetWorthStore>,
    pub bank_link: Arc<BankLinkStore>,
}

impl FinanceClient {
    /// HTTP backend plus a file-backed cache, both from config.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let api = Arc::new(HttpApi::new(config)?);
        let cache = Arc::new(LibSqlCache::new_local(&config.cache_path).await?);
        info!(api = %config.api_url, user = %config.user_id, "Finance client ready");
        Ok(Self::with_parts(api, cache, &config.user_id))
    }

    /// Assemble from any backend implementing all three API traits.
    pub fn with_parts<A>(api: Arc<A>, cache: Arc<dyn Cache>, user_id: &str) -> Self
    where
        A: OnboardingApi + NetWorthApi + BankLinkApi + 'static,
    {
        Self {
            onboarding: OnboardingStore::new(api.clone(), cache.clone(), user_id),
            net_worth: NetWorthStore::new(api.clone(), cache.clone(), user_id),
            bank_link: BankLinkStore::new(api, cache, user_id),
        }
    }

    /// Load every store from the local cache.
    pub async fn hydrate_all(&self) -> Hydrated {
        let (onboarding, net_worth, bank_link) = tokio::join!(
            self.onboarding.hydrate(),
            self.net_worth.hydrate(),
            self.bank_link.hydrate(),
        );
        Hydrated {
            onboarding,
            net_worth,
            bank_link,
        }
    }

    /// Pull fresh state for every store from the backend.
    pub async fn refresh_all(&self) -> Result<()> {
        let (onboarding, net_worth, accounts) = tokio::join!(
            self.onboarding.start(),
            self.net_worth.refresh(),
            self.bank_link.refresh_accounts(),
        );
        onboarding?;
        net_worth?;
        accounts?;
        Ok(())
    }

    // ── Cross-store operations ──────────────────────────────────────

    pub async fn answer(
        &self,
        question: QuestionId,
        answer: Answer,
        count: Option<u32>,
        counts: Option<BTreeMap<String, u32>>,
    ) -> Result<AnswerOutcome> {
        self.onboarding.answer(question, answer, count, counts).await
    }

    /// Complete an onboarding task; the new entity shows up in net worth.
    pub async fn complete_task(
        &self,
        task_id: &str,
        name: &str,
        value: Decimal,
        interest_rate: Option<Decimal>,
    ) -> Result<String> {
        let entity_id = self
            .onboarding
            .complete_task(task_id, name, value, interest_rate)
            .await?;
        self.refresh_net_worth().await;
        Ok(entity_id)
    }

    /// Reset onboarding. The backend wipes assets and liabilities with it.
    pub async fn reset_onboarding(&self) -> Result<()> {
        self.onboarding.reset().await?;
        self.refresh_net_worth().await;
        Ok(())
    }

    pub async fn sync_all(&self) -> Result<SyncResponse> {
        let response = self.bank_link.sync_all().await?;
        self.refresh_net_worth().await;
        Ok(response)
    }

    pub async fn sync_account(&self, id: &str) -> Result<SyncResponse> {
        let response = self.bank_link.sync_account(id).await?;
        self.refresh_net_worth().await;
        Ok(response)
    }

    pub async fn link_account(&self, id: &str, entity: LinkEntity) -> Result<LinkOutcome> {
        let outcome = self.bank_link.link_account(id, entity).await?;
        self.refresh_net_worth().await;
        Ok(outcome)
    }

    /// The triggering operation already succeeded; a failed refresh only
    /// leaves the cached figures behind.
    async fn refresh_net_worth(&self) {
        if let Err(e) = self.net_worth.refresh().await {
            warn!("Net worth refresh failed: {}", e);
        }
    }
}
