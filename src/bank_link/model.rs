//! Bank-link data models: link tokens, aggregator accounts and sync results.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::onboarding::questions::EntityKind;

/// How long an issued link token is reused before asking for a new one.
pub const LINK_TOKEN_TTL_HOURS: i64 = 4;

/// A link token for opening the aggregator's Link widget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkToken {
    pub link_token: String,
    /// When the token was received. Not sent by the server.
    #[serde(
        default = "Utc::now",
        deserialize_with = "crate::serde_util::utc_lenient::deserialize"
    )]
    pub created_at: DateTime<Utc>,
}

impl LinkToken {
    pub fn new(link_token: String) -> Self {
        Self {
            link_token,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at >= Duration::hours(LINK_TOKEN_TTL_HOURS)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// An account returned by the token exchange, not yet attached to an
/// asset or liability. `account_id` is the backend's connected-account id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaidAccountInfo {
    pub account_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub suggested_category: Option<String>,
    pub is_asset: bool,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub current_balance: Option<Decimal>,
}

/// A bank account connected through the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectedAccount {
    pub id: String,
    pub institution_name: String,
    pub account_name: String,
    pub account_type: String,
    #[serde(default)]
    pub account_subtype: Option<String>,
    pub is_active: bool,
    #[serde(default, deserialize_with = "crate::serde_util::utc_lenient_opt::deserialize")]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sync_error: Option<String>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// Envelope of `GET /plaid/accounts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedAccountList {
    pub accounts: Vec<ConnectedAccount>,
}

/// One failed account inside a bulk sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncError {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    pub error: String,
}

/// Result of `POST /plaid/sync` or `POST /plaid/accounts/{id}/sync`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub successful: Option<u32>,
    #[serde(default)]
    pub failed: Option<u32>,
    #[serde(default)]
    pub errors: Option<Vec<SyncError>>,
}

/// Body of `POST /plaid/accounts/{id}/link`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkEntity {
    pub entity_id: String,
    pub entity_type: EntityKind,
}

impl LinkEntity {
    pub fn asset(id: impl Into<String>) -> Self {
        Self {
            entity_id: id.into(),
            entity_type: EntityKind::Asset,
        }
    }

    pub fn liability(id: impl Into<String>) -> Self {
        Self {
            entity_id: id.into(),
            entity_type: EntityKind::Liability,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Ok,
    /// Linked, but the follow-up balance sync failed.
    Partial,
}

/// Result of linking an account to an asset or liability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkOutcome {
    pub status: LinkStatus,
    pub message: String,
    #[serde(default)]
    pub sync_error: Option<String>,
}

const ASSET_PAIRS: &[(&str, &str, &str)] = &[
    ("depository", "checking", "cash"),
    ("depository", "savings", "savings"),
    ("depository", "money market", "savings"),
    ("depository", "cd", "savings"),
    ("investment", "401k", "retirement_401k"),
    ("investment", "403b", "retirement_401k"),
    ("investment", "ira", "retirement_ira"),
    ("investment", "roth", "retirement_roth"),
    ("investment", "hsa", "retirement_hsa"),
    ("investment", "pension", "retirement_pension"),
    ("investment", "brokerage", "brokerage"),
    ("investment", "529", "other"),
    ("other", "other", "other"),
];

const LIABILITY_PAIRS: &[(&str, &str, &str)] = &[
    ("credit", "credit card", "credit_card"),
    ("loan", "auto", "auto_loan"),
    ("loan", "student", "student_loan"),
    ("loan", "mortgage", "mortgage"),
    ("loan", "personal", "personal_loan"),
];

fn lookup(table: &[(&str, &str, &'static str)], ty: &str, subtype: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(t, s, _)| *t == ty && *s == subtype)
        .map(|(_, _, c)| *c)
}

/// Map an aggregator (type, subtype) to `(category, is_asset)`.
///
/// Case-insensitive. Unmapped depository/investment accounts fall back to
/// an "other" asset, credit/loan accounts to an "other" liability, and
/// anything else to `(None, false)`.
pub fn suggest_category(account_type: &str, subtype: Option<&str>) -> (Option<&'static str>, bool) {
    let ty = account_type.to_lowercase();
    let sub = subtype.unwrap_or_default().to_lowercase();

    if let Some(c) = lookup(ASSET_PAIRS, &ty, &sub) {
        return (Some(c), true);
    }
    if let Some(c) = lookup(LIABILITY_PAIRS, &ty, &sub) {
        return (Some(c), false);
    }

    match ty.as_str() {
        "depository" | "investment" => (Some("other"), true),
        "credit" | "loan" => (Some("other"), false),
        _ => (None, false),
    }
}

impl PlaidAccountInfo {
    /// Fill `suggested_category` from the local mapping when the server left it out.
    pub(crate) fn with_suggestion(mut self) -> Self {
        if self.suggested_category.is_none() {
            let (category, is_asset) = suggest_category(&self.account_type, self.subtype.as_deref());
            self.suggested_category = category.map(String::from);
            if category.is_some() {
                self.is_asset = is_asset;
            }
        }
        self
    }
}
