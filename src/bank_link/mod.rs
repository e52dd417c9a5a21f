//! Bank linking through the backend's aggregator proxy.
//!
//! The flow is: issue a link token, hand it to the aggregator widget,
//! exchange the public token it returns, then attach each new account to
//! an asset or liability. Connected accounts also expose their
//! transactions and investment holdings, mirrored per account.

pub mod activity;
pub mod model;
pub mod store;

pub use activity::{
    Holding, HoldingSyncResponse, Security, Transaction, TransactionList, TransactionQuery,
    TransactionSyncAllResponse, TransactionSyncResponse,
};
pub use model::{
    ConnectedAccount, LinkEntity, LinkOutcome, LinkStatus, LinkToken, PlaidAccountInfo,
    SyncResponse, suggest_category,
};
pub use store::BankLinkStore;
