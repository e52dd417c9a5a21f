//! You Can FI: client core.

pub mod api;
pub mod bank_link;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod net_worth;
pub mod onboarding;
pub mod serde_util;
pub mod store;

pub use client::FinanceClient;
pub use error::{Error, Result};
