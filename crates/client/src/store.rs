//! Remote item store boundary.

use async_trait::async_trait;
use reqwest::Url;
use stockroom_core::ItemId;
use stockroom_inventory::{ItemPayload, RawItem};

use crate::config::ClientConfig;
use crate::fetch::decode_item_list;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid store URL: {0}")]
    InvalidUrl(String),
}

/// CRUD operations the client needs from the authoritative store.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn list(&self) -> Result<Vec<RawItem>, StoreError>;

    async fn create(&self, payload: &ItemPayload) -> Result<RawItem, StoreError>;

    async fn update(&self, id: &ItemId, payload: &ItemPayload) -> Result<RawItem, StoreError>;

    async fn delete(&self, id: &ItemId) -> Result<(), StoreError>;
}

/// JSON-over-HTTP store (`/api/items`).
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    items_url: Url,
}

impl HttpStore {
    pub fn new(config: &ClientConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let items_url = Url::parse(&config.items_url())
            .map_err(|e| StoreError::InvalidUrl(format!("{}: {e}", config.api_url)))?;
        if items_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(config.api_url.clone()));
        }

        Ok(Self { client, items_url })
    }

    /// `/api/items/{id}` with the id percent-encoded as one path segment.
    fn item_url(&self, id: &ItemId) -> Result<Url, StoreError> {
        let mut url = self.items_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.items_url.to_string()))?
            .pop_if_empty()
            .push(id.as_str());
        Ok(url)
    }

    async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Api(status.as_u16(), body))
    }

    async fn read_item(resp: reqwest::Response) -> Result<RawItem, StoreError> {
        let resp = Self::ensure_success(resp).await?;
        resp.json::<RawItem>()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ItemStore for HttpStore {
    async fn list(&self) -> Result<Vec<RawItem>, StoreError> {
        let resp = self
            .client
            .get(self.items_url.clone())
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let resp = Self::ensure_success(resp).await?;

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;

        Ok(decode_item_list(body))
    }

    async fn create(&self, payload: &ItemPayload) -> Result<RawItem, StoreError> {
        let resp = self
            .client
            .post(self.items_url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Self::read_item(resp).await
    }

    async fn update(&self, id: &ItemId, payload: &ItemPayload) -> Result<RawItem, StoreError> {
        let resp = self
            .client
            .put(self.item_url(id)?)
            .json(payload)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Self::read_item(resp).await
    }

    async fn delete(&self, id: &ItemId) -> Result<(), StoreError> {
        let resp = self
            .client
            .delete(self.item_url(id)?)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Self::ensure_success(resp).await.map(|_| ())
    }
}
