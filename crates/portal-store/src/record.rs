//! Typed records over the document store

use crate::collection::{Collection, CounterPath};
use crate::error::StoreError;
use crate::store::PortalStore;
use async_trait::async_trait;
use portal_model::{Article, Guest, MediaAsset, Meeting, RecordId};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A domain type stored in one collection
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection holding this type
    const COLLECTION: Collection;

    /// Record id
    fn record_id(&self) -> &RecordId;
}

impl Record for Article {
    const COLLECTION: Collection = Collection::Articles;

    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

impl Record for Meeting {
    const COLLECTION: Collection = Collection::Meetings;

    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

impl Record for MediaAsset {
    const COLLECTION: Collection = Collection::MediaAssets;

    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

impl Record for Guest {
    const COLLECTION: Collection = Collection::Guests;

    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

/// Typed access to any [`PortalStore`]
#[async_trait]
pub trait RecordStore {
    /// Decode every document of `R`'s collection
    async fn list_records<R: Record>(&self) -> Result<Vec<R>, StoreError>;

    /// Decode one record
    async fn get_record<R: Record>(&self, id: &RecordId) -> Result<Option<R>, StoreError>;

    /// Insert a record
    async fn create_record<R: Record>(&self, record: &R) -> Result<(), StoreError>;

    /// Replace a record
    async fn update_record<R: Record>(&self, record: &R) -> Result<(), StoreError>;

    /// Replace a record, keeping the stored value of each counter in `keep`
    async fn update_record_keeping_counters<R: Record>(
        &self,
        record: &R,
        keep: &[CounterPath],
    ) -> Result<(), StoreError>;

    /// Remove a record
    async fn delete_record<R: Record>(&self, id: &RecordId) -> Result<(), StoreError>;

    /// Decode a setting
    async fn get_typed_setting<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, StoreError>;

    /// Encode and store a setting
    async fn put_typed_setting<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: PortalStore + ?Sized> RecordStore for S {
    async fn list_records<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        self.list_all(R::COLLECTION)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(|e| StoreError::decode(R::COLLECTION, e)))
            .collect()
    }

    async fn get_record<R: Record>(&self, id: &RecordId) -> Result<Option<R>, StoreError> {
        match self.get_one(R::COLLECTION, id.as_str()).await? {
            Some(doc) => serde_json::from_value(doc)
                .map(Some)
                .map_err(|e| StoreError::decode(R::COLLECTION, e)),
            None => Ok(None),
        }
    }

    async fn create_record<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let doc = serde_json::to_value(record).map_err(|e| StoreError::decode(R::COLLECTION, e))?;
        self.create(R::COLLECTION, doc).await
    }

    async fn update_record<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let doc = serde_json::to_value(record).map_err(|e| StoreError::decode(R::COLLECTION, e))?;
        self.update(R::COLLECTION, doc).await
    }

    async fn update_record_keeping_counters<R: Record>(
        &self,
        record: &R,
        keep: &[CounterPath],
    ) -> Result<(), StoreError> {
        let doc = serde_json::to_value(record).map_err(|e| StoreError::decode(R::COLLECTION, e))?;
        self.update_keeping_counters(R::COLLECTION, doc, keep).await
    }

    async fn delete_record<R: Record>(&self, id: &RecordId) -> Result<(), StoreError> {
        self.delete(R::COLLECTION, id.as_str()).await
    }

    async fn get_typed_setting<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_setting(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::decode(key, e)),
            None => Ok(None),
        }
    }

    async fn put_typed_setting<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|e| StoreError::decode(key, e))?;
        self.upsert_setting(key, value).await
    }
}
