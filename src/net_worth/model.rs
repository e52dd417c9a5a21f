//! Net-worth data models: assets, liabilities and the server-computed summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::onboarding::model::{validate_interest_rate, validate_name};

/// Asset categories accepted by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Cash,
    Savings,
    #[serde(rename = "retirement_401k")]
    Retirement401k,
    RetirementIra,
    RetirementRoth,
    RetirementHsa,
    RetirementPension,
    RetirementOther,
    Brokerage,
    RealEstatePrimary,
    RealEstateRental,
    RealEstateLand,
    Vehicle,
    Business,
    Valuables,
    Other,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 16] = [
        Self::Cash,
        Self::Savings,
        Self::Retirement401k,
        Self::RetirementIra,
        Self::RetirementRoth,
        Self::RetirementHsa,
        Self::RetirementPension,
        Self::RetirementOther,
        Self::Brokerage,
        Self::RealEstatePrimary,
        Self::RealEstateRental,
        Self::RealEstateLand,
        Self::Vehicle,
        Self::Business,
        Self::Valuables,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Savings => "savings",
            Self::Retirement401k => "retirement_401k",
            Self::RetirementIra => "retirement_ira",
            Self::RetirementRoth => "retirement_roth",
            Self::RetirementHsa => "retirement_hsa",
            Self::RetirementPension => "retirement_pension",
            Self::RetirementOther => "retirement_other",
            Self::Brokerage => "brokerage",
            Self::RealEstatePrimary => "real_estate_primary",
            Self::RealEstateRental => "real_estate_rental",
            Self::RealEstateLand => "real_estate_land",
            Self::Vehicle => "vehicle",
            Self::Business => "business",
            Self::Valuables => "valuables",
            Self::Other => "other",
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cash => "Cash & Checking",
            Self::Savings => "Savings",
            Self::Retirement401k => "401(k)",
            Self::RetirementIra => "Traditional IRA",
            Self::RetirementRoth => "Roth IRA",
            Self::RetirementHsa => "HSA",
            Self::RetirementPension => "Pension",
            Self::RetirementOther => "Other Retirement",
            Self::Brokerage => "Brokerage",
            Self::RealEstatePrimary => "Primary Residence",
            Self::RealEstateRental => "Rental Property",
            Self::RealEstateLand => "Land",
            Self::Vehicle => "Vehicles",
            Self::Business => "Business",
            Self::Valuables => "Valuables",
            Self::Other => "Other Assets",
        }
    }

    /// Chart color (hex).
    pub fn color(&self) -> &'static str {
        match self {
            Self::Cash => "#4a7c59",
            Self::Savings => "#5a9b6a",
            Self::Retirement401k => "#1e3a5f",
            Self::RetirementIra => "#2d5a8a",
            Self::RetirementRoth => "#3d6a9a",
            Self::RetirementHsa => "#4d7aaa",
            Self::RetirementPension => "#5d8aba",
            Self::RetirementOther => "#6d9aca",
            Self::Brokerage => "#d4a84b",
            Self::RealEstatePrimary => "#8b7355",
            Self::RealEstateRental => "#9b8365",
            Self::RealEstateLand => "#ab9375",
            Self::Vehicle => "#636e72",
            Self::Business => "#2d3436",
            Self::Valuables => "#b8922f",
            Self::Other => "#a0a0a0",
        }
    }
}

impl std::fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown asset category '{s}'"))
    }
}

/// Liability categories accepted by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LiabilityCategory {
    Mortgage,
    CreditCard,
    AutoLoan,
    StudentLoan,
    PersonalLoan,
    Other,
}

impl LiabilityCategory {
    pub const ALL: [LiabilityCategory; 6] = [
        Self::Mortgage,
        Self::CreditCard,
        Self::AutoLoan,
        Self::StudentLoan,
        Self::PersonalLoan,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mortgage => "mortgage",
            Self::CreditCard => "credit_card",
            Self::AutoLoan => "auto_loan",
            Self::StudentLoan => "student_loan",
            Self::PersonalLoan => "personal_loan",
            Self::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Mortgage => "Mortgage",
            Self::CreditCard => "Credit Cards",
            Self::AutoLoan => "Auto Loan",
            Self::StudentLoan => "Student Loans",
            Self::PersonalLoan => "Personal Loan",
            Self::Other => "Other Debt",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Mortgage => "#c75c5c",
            Self::CreditCard => "#d77070",
            Self::AutoLoan => "#e78484",
            Self::StudentLoan => "#f79898",
            Self::PersonalLoan => "#e7a8a8",
            Self::Other => "#c7b8b8",
        }
    }
}

impl std::fmt::Display for LiabilityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LiabilityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown liability category '{s}'"))
    }
}

/// An asset as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub id: String,
    pub category: AssetCategory,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    #[serde(default)]
    pub connected_account_id: Option<String>,
    #[serde(default)]
    pub is_connected: bool,
    #[serde(default, deserialize_with = "crate::serde_util::utc_lenient_opt::deserialize")]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub updated_at: DateTime<Utc>,
}

/// A liability as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Liability {
    pub id: String,
    pub category: LiabilityCategory,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub interest_rate: Option<Decimal>,
    #[serde(default)]
    pub connected_account_id: Option<String>,
    #[serde(default)]
    pub is_connected: bool,
    #[serde(default, deserialize_with = "crate::serde_util::utc_lenient_opt::deserialize")]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /assets/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAsset {
    pub category: AssetCategory,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

impl NewAsset {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        non_negative("value", self.value)
    }

    /// Local stand-in shown until the server assigns an id.
    pub(crate) fn placeholder(&self, id: String) -> Asset {
        let now = Utc::now();
        Asset {
            id,
            category: self.category,
            name: self.name.clone(),
            value: self.value,
            connected_account_id: None,
            is_connected: false,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Body of `PUT /assets/{id}`. All fields optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AssetUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<AssetCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Decimal>,
}

impl AssetUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.category.is_none() && self.name.is_none() && self.value.is_none() {
            return Err(ValidationError::EmptyUpdate);
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(value) = self.value {
            non_negative("value", value)?;
        }
        Ok(())
    }

    /// Apply the changed fields to a local copy.
    pub(crate) fn apply_to(&self, asset: &mut Asset) {
        if let Some(category) = self.category {
            asset.category = category;
        }
        if let Some(name) = &self.name {
            asset.name = name.clone();
        }
        if let Some(value) = self.value {
            asset.value = value;
        }
        asset.updated_at = Utc::now();
    }
}

/// Body of `POST /liabilities/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewLiability {
    pub category: LiabilityCategory,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub interest_rate: Option<Decimal>,
}

impl NewLiability {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        non_negative("balance", self.balance)?;
        validate_interest_rate(self.interest_rate)
    }

    pub(crate) fn placeholder(&self, id: String) -> Liability {
        let now = Utc::now();
        Liability {
            id,
            category: self.category,
            name: self.name.clone(),
            balance: self.balance,
            interest_rate: self.interest_rate,
            connected_account_id: None,
            is_connected: false,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Body of `PUT /liabilities/{id}`. All fields optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LiabilityUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<LiabilityCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub balance: Option<Decimal>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub interest_rate: Option<Decimal>,
}

impl LiabilityUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.category.is_none()
            && self.name.is_none()
            && self.balance.is_none()
            && self.interest_rate.is_none()
        {
            return Err(ValidationError::EmptyUpdate);
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(balance) = self.balance {
            non_negative("balance", balance)?;
        }
        validate_interest_rate(self.interest_rate)
    }

    pub(crate) fn apply_to(&self, liability: &mut Liability) {
        if let Some(category) = self.category {
            liability.category = category;
        }
        if let Some(name) = &self.name {
            liability.name = name.clone();
        }
        if let Some(balance) = self.balance {
            liability.balance = balance;
        }
        if self.interest_rate.is_some() {
            liability.interest_rate = self.interest_rate;
        }
        liability.updated_at = Utc::now();
    }
}

fn non_negative(field: &'static str, amount: Decimal) -> Result<(), ValidationError> {
    if amount < Decimal::ZERO {
        return Err(ValidationError::Negative { field });
    }
    Ok(())
}

/// One slice of the asset or liability breakdown chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryBreakdown {
    pub category: String,
    pub label: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub percentage: f64,
    pub color: String,
}

/// Net-worth totals and breakdowns, computed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetWorthSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_assets: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_liabilities: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_worth: Decimal,
    #[serde(default)]
    pub assets_by_category: BTreeMap<String, f64>,
    #[serde(default)]
    pub liabilities_by_category: BTreeMap<String, f64>,
    #[serde(default)]
    pub asset_breakdown: Vec<CategoryBreakdown>,
    #[serde(default)]
    pub liability_breakdown: Vec<CategoryBreakdown>,
    #[serde(deserialize_with = "crate::serde_util::utc_lenient::deserialize")]
    pub last_updated: DateTime<Utc>,
}
