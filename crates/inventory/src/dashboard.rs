//! Overview panel: every statistic computed from one snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{PricePolicy, aggregate_with};
use crate::item::RawItem;
use crate::metrics::{
    self, CategoryCount, DEFAULT_RANKING_SIZE, InventoryValue, LOW_STOCK_THRESHOLD, LowStockEntry,
    PopularityRanking, RestockReminder, TopStockedEntry,
};

/// Tunables for [`Dashboard::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DashboardSettings {
    pub low_stock_threshold: f64,
    pub ranking_size: usize,
    pub price_policy: PricePolicy,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            low_stock_threshold: LOW_STOCK_THRESHOLD,
            ranking_size: DEFAULT_RANKING_SIZE,
            price_policy: PricePolicy::Sum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub total_items: usize,
    pub category_count: usize,
    pub low_stock: Vec<LowStockEntry>,
    pub inventory_value: InventoryValue,
    pub categories: Vec<CategoryCount>,
    pub top_stocked: Vec<TopStockedEntry>,
    pub popularity: PopularityRanking,
    pub restock_reminders: Vec<RestockReminder>,
    pub computed_at: DateTime<Utc>,
}

impl Dashboard {
    /// Merge `raw` and derive every panel against the single instant `now`.
    pub fn compute(raw: &[RawItem], now: DateTime<Utc>, settings: &DashboardSettings) -> Self {
        let items = aggregate_with(raw, settings.price_policy);
        let categories = metrics::category_distribution(&items);

        Self {
            total_items: metrics::total_items(&items),
            category_count: categories.len(),
            low_stock: metrics::low_stock(&items, settings.low_stock_threshold),
            inventory_value: metrics::inventory_value(&items),
            categories,
            top_stocked: metrics::top_stocked(&items, settings.ranking_size),
            popularity: metrics::popularity(raw, settings.ranking_size),
            restock_reminders: metrics::restock_reminders(raw, now),
            computed_at: now,
        }
    }
}
