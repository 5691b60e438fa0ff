//! Add/edit form contents and their conversion into store payloads.

use serde::{Deserialize, Serialize};
use stockroom_core::{DomainError, DomainResult};

use crate::item::{ItemPayload, RawItem, parse_date};

/// Raw text of the item form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemDraft {
    pub name: String,
    pub quantity: String,
    pub price: String,
    pub category: String,
    /// Semicolon separated, e.g. `tech; blue`.
    pub tags: String,
    pub restock_by: String,
}

impl ItemDraft {
    /// Pre-fill the form from an existing record.
    pub fn from_item(item: &RawItem) -> Self {
        Self {
            name: item.name.clone(),
            quantity: item.quantity.to_string(),
            price: item.price.to_string(),
            category: item.category.clone().unwrap_or_default(),
            tags: item.tags.join("; "),
            restock_by: item
                .restock_by
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }

    pub fn to_payload(&self) -> DomainResult<ItemPayload> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let quantity = parse_amount("quantity", &self.quantity)?;
        let price = parse_amount("price", &self.price)?;

        let category = Some(self.category.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let restock_by = match self.restock_by.trim() {
            "" => None,
            s => Some(
                parse_date(s)
                    .ok_or_else(|| DomainError::validation(format!("invalid restock date '{s}'")))?,
            ),
        };

        Ok(ItemPayload {
            name: name.to_string(),
            quantity,
            price,
            category,
            tags: split_tags(&self.tags),
            restock_by,
        })
    }
}

/// Split `a; b;;c` into `["a", "b", "c"]`.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_amount(field: &str, raw: &str) -> DomainResult<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| DomainError::validation(format!("{field} must be a number")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::validation(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(value)
}
