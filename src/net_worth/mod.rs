//! Net worth: assets, liabilities and the backend-computed summary.

pub mod model;
pub mod store;

pub use model::{
    Asset, AssetCategory, AssetUpdate, CategoryBreakdown, Liability, LiabilityCategory,
    LiabilityUpdate, NetWorthSummary, NewAsset, NewLiability,
};
pub use store::NetWorthStore;
