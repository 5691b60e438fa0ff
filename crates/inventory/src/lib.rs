//! Inventory reconciliation and analytics.
//!
//! This crate contains the item schema, duplicate merging and derived
//! statistics, implemented purely as deterministic logic (no IO, no HTTP, no
//! timers).

pub mod aggregate;
pub mod dashboard;
pub mod draft;
pub mod item;
pub mod metrics;
pub mod query;

pub use aggregate::{PricePolicy, aggregate, aggregate_with, group_members};
pub use dashboard::{Dashboard, DashboardSettings};
pub use draft::{ItemDraft, split_tags};
pub use item::{CanonicalItem, GroupKey, ItemPayload, RawItem, UNCATEGORIZED, normalize};
pub use metrics::{
    CategoryCount, InventoryValue, LOW_STOCK_THRESHOLD, LeastPopular, LowStockEntry,
    PopularityEntry, PopularityRanking, RestockReminder, TopStockedEntry,
};
pub use query::{CategoryFilter, ListQuery, category_options, display_name};
