//! The persistence collaborator contract

use crate::collection::{carry_counters, document_id, Collection, CounterPath, Document};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;

/// Backend-neutral persistence used by the portal controller.
///
/// Documents are JSON objects carrying a string `id`. `list_all` is unordered;
/// callers sort. Implementations must be safe to share across tasks.
#[async_trait]
pub trait PortalStore: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// All documents of a collection, in no particular order
    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    /// One document by id
    async fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Insert a new document; fails with `Duplicate` if the id exists
    async fn create(&self, collection: Collection, doc: Document) -> Result<(), StoreError>;

    /// Replace an existing document; fails with `NotFound` if absent
    async fn update(&self, collection: Collection, doc: Document) -> Result<(), StoreError>;

    /// Replace an existing document, keeping the stored value of every
    /// counter in `keep`; fails with `NotFound` if absent.
    ///
    /// Counters bumped by `increment_counter` after the caller read the
    /// document survive the replacement. The default reads then writes and
    /// shares the race window of a non-atomic increment; backends with a
    /// write lock override it to do both under the lock.
    async fn update_keeping_counters(
        &self,
        collection: Collection,
        mut doc: Document,
        keep: &[CounterPath],
    ) -> Result<(), StoreError> {
        let id = document_id(collection, &doc)?;
        let stored = self
            .get_one(collection, &id)
            .await?
            .ok_or(StoreError::NotFound { collection, id })?;
        carry_counters(&stored, &mut doc, keep)?;
        self.update(collection, doc).await
    }

    /// Remove a document; removing an absent id succeeds
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Atomically add one to a counter and return the new value
    async fn increment_counter(
        &self,
        collection: Collection,
        id: &str,
        path: &CounterPath,
    ) -> Result<u64, StoreError>;

    /// Whether `increment_counter` is atomic under concurrent callers.
    ///
    /// When `false`, callers fall back to read-modify-write through
    /// `get_one` + `update` and accept the race window.
    fn supports_atomic_increment(&self) -> bool {
        true
    }

    /// Read a setting
    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or overwrite a setting
    async fn upsert_setting(&self, key: &str, value: Value) -> Result<(), StoreError>;
}
