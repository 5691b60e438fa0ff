//! Derived statistics over the merged item view.
//!
//! Everything here is a pure function of its inputs. Callers that need a
//! notion of "now" pass it in, so one computation sees a single instant.

use chrono::{DateTime, Utc};
use serde::Serialize;
use stockroom_core::ItemId;

use crate::item::{CanonicalItem, RawItem};

/// Items with a quantity strictly below this are reported as low stock.
pub const LOW_STOCK_THRESHOLD: f64 = 5.0;

/// Default length of the top/least rankings.
pub const DEFAULT_RANKING_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowStockEntry {
    pub id: ItemId,
    pub name: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopStockedEntry {
    /// 1-based position.
    pub rank: usize,
    pub id: ItemId,
    pub name: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularityEntry {
    pub updates: usize,
    pub item: RawItem,
}

/// Least-popular panel content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "entries", rename_all = "snake_case")]
pub enum LeastPopular {
    Ranked(Vec<PopularityEntry>),
    /// Not enough distinct items to tell the bottom apart from the top.
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularityRanking {
    pub top: Vec<PopularityEntry>,
    pub least: LeastPopular,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestockReminder {
    pub id: ItemId,
    pub name: String,
    pub restock_by: DateTime<Utc>,
    pub is_past: bool,
}

/// Total stock value; renders with two decimals.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct InventoryValue(pub f64);

impl core::fmt::Display for InventoryValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

pub fn total_items(items: &[CanonicalItem]) -> usize {
    items.len()
}

pub fn inventory_value(items: &[CanonicalItem]) -> InventoryValue {
    InventoryValue(items.iter().map(CanonicalItem::value).sum())
}

pub fn low_stock(items: &[CanonicalItem], threshold: f64) -> Vec<LowStockEntry> {
    items
        .iter()
        .filter(|i| i.quantity < threshold)
        .map(|i| LowStockEntry {
            id: i.id.clone(),
            name: i.name.clone(),
            quantity: i.quantity,
        })
        .collect()
}

/// Highest quantities first; equal quantities keep input order.
pub fn top_stocked(items: &[CanonicalItem], n: usize) -> Vec<TopStockedEntry> {
    let mut sorted: Vec<&CanonicalItem> = items.iter().collect();
    sorted.sort_by(|a, b| b.quantity.total_cmp(&a.quantity));
    sorted
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(idx, i)| TopStockedEntry {
            rank: idx + 1,
            id: i.id.clone(),
            name: i.name.clone(),
            quantity: i.quantity,
        })
        .collect()
}

/// Item count per category label, in first-seen category order.
pub fn category_distribution(items: &[CanonicalItem]) -> Vec<CategoryCount> {
    let mut out: Vec<CategoryCount> = Vec::new();
    for item in items {
        let label = item.category_label();
        match out.iter_mut().find(|c| c.category == label) {
            Some(entry) => entry.count += 1,
            None => out.push(CategoryCount {
                category: label.to_string(),
                count: 1,
            }),
        }
    }
    out
}

/// Rank raw records by number of recorded updates.
///
/// Records without history are ignored. `least` is the tail of the same
/// ordering; when it holds exactly the same entries as `top` it is reported as
/// [`LeastPopular::NoData`] instead.
pub fn popularity(items: &[RawItem], n: usize) -> PopularityRanking {
    let mut ranked: Vec<PopularityEntry> = items
        .iter()
        .filter(|i| !i.history.is_empty())
        .map(|i| PopularityEntry {
            updates: i.update_count(),
            item: i.clone(),
        })
        .collect();
    ranked.sort_by(|a, b| b.updates.cmp(&a.updates));

    let top: Vec<PopularityEntry> = ranked.iter().take(n).cloned().collect();
    let least: Vec<PopularityEntry> = ranked[ranked.len().saturating_sub(n)..].to_vec();

    let least = if same_entries(&top, &least) {
        LeastPopular::NoData
    } else {
        LeastPopular::Ranked(least)
    };

    PopularityRanking { top, least }
}

fn same_entries(a: &[PopularityEntry], b: &[PopularityEntry]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
}

/// Records with a restock date, earliest first, flagged when already overdue.
///
/// Takes raw records: duplicates may each carry their own date.
pub fn restock_reminders(items: &[RawItem], now: DateTime<Utc>) -> Vec<RestockReminder> {
    let mut reminders: Vec<RestockReminder> = items
        .iter()
        .filter_map(|i| {
            i.restock_by.map(|at| RestockReminder {
                id: i.id.clone(),
                name: i.name.clone(),
                restock_by: at,
                is_past: at < now,
            })
        })
        .collect();
    reminders.sort_by_key(|r| r.restock_by);
    reminders
}
