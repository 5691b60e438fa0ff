//! In-memory item store (tests, demos, offline development).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use stockroom_core::ItemId;
use stockroom_inventory::{ItemPayload, RawItem};

use crate::store::{ItemStore, StoreError};

/// Thread-safe in-memory [`ItemStore`].
///
/// Records every delete it receives and can be told to fail list or delete
/// requests, which makes it suitable for exercising the failure paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    items: RwLock<Vec<RawItem>>,
    deletes: RwLock<Vec<ItemId>>,
    next_id: AtomicU64,
    fail_lists: AtomicBool,
    fail_deletes: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<RawItem>) -> Self {
        let store = Self::new();
        if let Ok(mut guard) = store.inner.items.write() {
            *guard = items;
        }
        store
    }

    pub fn items(&self) -> Vec<RawItem> {
        self.inner
            .items
            .read()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    /// Ids passed to `delete`, in call order (including failed calls).
    pub fn delete_calls(&self) -> Vec<ItemId> {
        self.inner
            .deletes
            .read()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn fail_lists(&self, fail: bool) {
        self.inner.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.inner.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn poisoned() -> StoreError {
        StoreError::Network("memory store lock poisoned".to_string())
    }
}

fn apply_payload(item: &mut RawItem, payload: &ItemPayload) {
    item.name = payload.name.clone();
    item.quantity = payload.quantity;
    item.price = payload.price;
    item.category = payload.category.clone();
    item.tags = payload.tags.clone();
    item.restock_by = payload.restock_by;
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn list(&self) -> Result<Vec<RawItem>, StoreError> {
        if self.inner.fail_lists.load(Ordering::SeqCst) {
            return Err(StoreError::Network("connection refused".to_string()));
        }
        Ok(self.items())
    }

    async fn create(&self, payload: &ItemPayload) -> Result<RawItem, StoreError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Api(500, "write rejected".to_string()));
        }
        let n = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut item = RawItem::new(format!("mem-{n}"), payload.name.clone());
        apply_payload(&mut item, payload);

        let mut items = self.inner.items.write().map_err(|_| Self::poisoned())?;
        items.push(item.clone());
        Ok(item)
    }

    async fn update(&self, id: &ItemId, payload: &ItemPayload) -> Result<RawItem, StoreError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Api(500, "write rejected".to_string()));
        }
        let mut items = self.inner.items.write().map_err(|_| Self::poisoned())?;
        let item = items
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| StoreError::Api(404, format!("item {id} not found")))?;
        apply_payload(item, payload);
        item.history.push(serde_json::json!({ "action": "update" }));
        Ok(item.clone())
    }

    async fn delete(&self, id: &ItemId) -> Result<(), StoreError> {
        self.inner
            .deletes
            .write()
            .map_err(|_| Self::poisoned())?
            .push(id.clone());

        if self.inner.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Api(503, "store unavailable".to_string()));
        }

        let mut items = self.inner.items.write().map_err(|_| Self::poisoned())?;
        let before = items.len();
        items.retain(|i| &i.id != id);
        if items.len() == before {
            return Err(StoreError::Api(404, format!("item {id} not found")));
        }
        Ok(())
    }
}
