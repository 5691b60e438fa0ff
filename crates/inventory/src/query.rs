//! List filtering ahead of grouping.

use serde::{Deserialize, Serialize};

use crate::aggregate::{PricePolicy, aggregate_with};
use crate::item::{CanonicalItem, RawItem};

/// Label of the catch-all category option.
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum CategoryFilter {
    #[default]
    All,
    /// Exact match on the category label (`Uncategorized` for records without one).
    Only(String),
}

impl CategoryFilter {
    /// Build from a selector value, treating `"All"` as no filter.
    pub fn from_selection(selection: &str) -> Self {
        if selection == ALL_CATEGORIES {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(selection.to_string())
        }
    }
}

/// Search box + category selector state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub search: String,
    pub category: CategoryFilter,
}

impl ListQuery {
    pub fn matches(&self, item: &RawItem) -> bool {
        let search = self.search.to_lowercase();
        if !item.name.to_lowercase().contains(&search) {
            return false;
        }
        match &self.category {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => item.category_label() == c,
        }
    }

    pub fn filter<'a>(&'a self, items: &'a [RawItem]) -> impl Iterator<Item = &'a RawItem> + 'a {
        items.iter().filter(move |i| self.matches(i))
    }

    /// Filter, then merge duplicates among the remaining records.
    pub fn grouped(&self, items: &[RawItem], policy: PricePolicy) -> Vec<CanonicalItem> {
        aggregate_with(self.filter(items), policy)
    }
}

/// Selector options: `All` followed by each distinct category label in first-seen order.
pub fn category_options(items: &[RawItem]) -> Vec<String> {
    let mut out = vec![ALL_CATEGORIES.to_string()];
    for item in items {
        let label = item.category_label();
        if !out.iter().any(|c| c == label) {
            out.push(label.to_string());
        }
    }
    out
}

/// Name as shown in lists: first character upper-cased.
pub fn display_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
