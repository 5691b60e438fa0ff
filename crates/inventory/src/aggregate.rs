//! Duplicate merging.
//!
//! Records are grouped by [`GroupKey`]; the first record seen for a key
//! supplies the id, display casing, tags and restock date, while quantity and
//! price are combined across the whole group.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

use crate::item::{CanonicalItem, GroupKey, RawItem};

/// How the price of a merged group is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricePolicy {
    /// Add up member prices. Matches the behaviour existing dashboards rely on.
    #[default]
    Sum,
    /// Use the highest member price as the representative unit price.
    Max,
}

impl PricePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricePolicy::Sum => "sum",
            PricePolicy::Max => "max",
        }
    }

    fn combine(self, acc: f64, next: f64) -> f64 {
        match self {
            PricePolicy::Sum => acc + next,
            PricePolicy::Max => acc.max(next),
        }
    }
}

impl FromStr for PricePolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(PricePolicy::Sum),
            "max" => Ok(PricePolicy::Max),
            other => Err(DomainError::validation(format!(
                "unknown price policy '{other}' (expected 'sum' or 'max')"
            ))),
        }
    }
}

/// Merge duplicates with the default [`PricePolicy::Sum`].
pub fn aggregate(items: &[RawItem]) -> Vec<CanonicalItem> {
    aggregate_with(items, PricePolicy::Sum)
}

/// Merge duplicates; output order is the first-seen order of each group key.
pub fn aggregate_with<'a, I>(items: I, policy: PricePolicy) -> Vec<CanonicalItem>
where
    I: IntoIterator<Item = &'a RawItem>,
{
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut out: Vec<CanonicalItem> = Vec::new();

    for item in items {
        let key = item.group_key();
        match index.get(&key).copied() {
            Some(slot) => {
                let merged = &mut out[slot];
                merged.quantity += item.quantity;
                merged.price = policy.combine(merged.price, item.price);
            }
            None => {
                index.insert(key, out.len());
                out.push(CanonicalItem {
                    id: item.id.clone(),
                    name: item.name.clone(),
                    category: item.category.clone(),
                    tags: item.tags.clone(),
                    quantity: item.quantity,
                    price: item.price,
                    restock_by: item.restock_by,
                });
            }
        }
    }

    out
}

/// Raw records belonging to the same group as `target`, in input order.
pub fn group_members<'a>(items: &'a [RawItem], target: &GroupKey) -> Vec<&'a RawItem> {
    items.iter().filter(|i| &i.group_key() == target).collect()
}
