//! Transactions and investment holdings pulled from connected accounts.
//!
//! The backend owns categorization and every aggregate; these types only
//! carry what it returns.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::model::SyncError;
use crate::error::ValidationError;

/// Largest page `GET /transactions/...` accepts.
pub const MAX_TRANSACTION_PAGE: u32 = 500;

/// Page size used when none is given.
pub const DEFAULT_TRANSACTION_PAGE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub connected_account_id: String,
    pub plaid_transaction_id: String,
    /// Positive for money leaving the account, as the aggregator reports it.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub authorized_date: Option<NaiveDate>,
    pub name: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub category_primary: Option<String>,
    #[serde(default)]
    pub category_detailed: Option<String>,
    #[serde(default)]
    pub payment_channel: Option<String>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub location_region: Option<String>,
    #[serde(default)]
    pub location_country: Option<String>,
    #[serde(default)]
    pub user_category: Option<String>,
    #[serde(default)]
    pub user_notes: Option<String>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// The user's category if they set one, else the aggregator's.
    pub fn display_category(&self) -> Option<&str> {
        self.user_category
            .as_deref()
            .or(self.category_primary.as_deref())
    }
}

/// Paging and date filters for transaction listings. Dates are inclusive.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TransactionQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl TransactionQuery {
    pub fn page(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
            ..Default::default()
        }
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Same bounds the backend enforces, checked before any request.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_TRANSACTION_PAGE {
                return Err(ValidationError::PageSize {
                    max: MAX_TRANSACTION_PAGE,
                });
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ValidationError::DateRange);
            }
        }
        Ok(())
    }
}

/// One page of `GET /transactions/` or `GET /transactions/account/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionList {
    pub transactions: Vec<Transaction>,
    /// Total matching rows on the backend, ignoring paging.
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl TransactionList {
    pub fn has_more(&self) -> bool {
        (self.offset as u64) + (self.transactions.len() as u64) < self.total
    }
}

/// Result of `POST /transactions/sync/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionSyncResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub added: u32,
    #[serde(default)]
    pub modified: u32,
    #[serde(default)]
    pub removed: u32,
}

/// Result of `POST /transactions/sync`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionSyncAllResponse {
    pub success: bool,
    pub message: String,
    pub total_accounts: u32,
    pub successful: u32,
    pub failed: u32,
    pub total_added: u32,
    pub total_modified: u32,
    pub total_removed: u32,
    #[serde(default)]
    pub errors: Option<Vec<SyncError>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Security {
    pub id: String,
    pub plaid_security_id: String,
    pub name: String,
    #[serde(default)]
    pub ticker_symbol: Option<String>,
    #[serde(default)]
    pub is_cash_equivalent: bool,
    #[serde(default, rename = "type")]
    pub security_type: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub close_price: Option<Decimal>,
    #[serde(default)]
    pub close_price_as_of: Option<NaiveDate>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

/// A position in an investment account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holding {
    pub id: String,
    pub connected_account_id: String,
    pub security_id: String,
    #[serde(default)]
    pub security: Option<Security>,
    #[serde(with = "rust_decimal::serde::float")]
    pub institution_price: Decimal,
    #[serde(default)]
    pub institution_price_as_of: Option<NaiveDate>,
    #[serde(with = "rust_decimal::serde::float")]
    pub institution_value: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub cost_basis: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    pub fn ticker(&self) -> Option<&str> {
        self.security.as_ref()?.ticker_symbol.as_deref()
    }
}

/// Envelope of `GET /holdings/account/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HoldingList {
    pub holdings: Vec<Holding>,
    pub total: u64,
}

/// Result of `POST /holdings/sync/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HoldingSyncResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub added: u32,
    #[serde(default)]
    pub securities: u32,
}
