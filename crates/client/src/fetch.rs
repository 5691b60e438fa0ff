//! Reading the authoritative item list.
//!
//! Reads never fail from the caller's point of view: a transport error or a
//! malformed body yields an empty list and flips connectivity to offline.

use serde_json::Value;
use stockroom_inventory::RawItem;

use crate::store::ItemStore;
use crate::types::ConnectivityState;

/// Result of one list request, already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub items: Vec<RawItem>,
    pub connectivity: ConnectivityState,
}

pub async fn fetch_items<S>(store: &S) -> FetchOutcome
where
    S: ItemStore + ?Sized,
{
    match store.list().await {
        Ok(items) => {
            tracing::debug!(count = items.len(), "fetched items");
            FetchOutcome {
                items,
                connectivity: ConnectivityState::Online,
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "item fetch failed, falling back to an empty list");
            FetchOutcome {
                items: Vec::new(),
                connectivity: ConnectivityState::Offline,
            }
        }
    }
}

/// Decode a list response body.
///
/// A non-array body is treated as empty; array entries that are not item
/// records (no `name`, or no `_id`/`id`) are skipped.
pub fn decode_item_list(body: Value) -> Vec<RawItem> {
    let Value::Array(entries) = body else {
        tracing::warn!("item list response is not an array, treating as empty");
        return Vec::new();
    };

    let total = entries.len();
    let items: Vec<RawItem> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RawItem>(entry) {
            Ok(item) if item.id.is_empty() => {
                tracing::warn!(name = %item.name, "skipping item record without an id");
                None
            }
            Ok(item) => Some(item),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed item record");
                None
            }
        })
        .collect();

    if items.len() < total {
        tracing::warn!(skipped = total - items.len(), total, "some item records were malformed");
    }
    items
}
