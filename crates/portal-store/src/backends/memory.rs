//! Process-local store
//!
//! Collections live behind one `RwLock`; every write, including counter
//! increments, happens under the write guard, so increments never lose updates.

use crate::collection::{apply_increment, carry_counters, document_id, Collection, CounterPath, Document};
use crate::error::StoreError;
use crate::store::PortalStore;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// In-memory `PortalStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Document>>>,
    settings: DashMap<String, Value>,
}

impl MemoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    #[must_use]
    pub fn len(&self, collection: Collection) -> usize {
        self.collections.read().get(&collection).map_or(0, BTreeMap::len)
    }

    /// True when a collection holds no documents
    #[must_use]
    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl PortalStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(&collection)
            .and_then(|docs| docs.get(id).cloned()))
    }

    async fn create(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        let id = document_id(collection, &doc)?;
        let mut guard = self.collections.write();
        let docs = guard.entry(collection).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::Duplicate { collection, id });
        }
        docs.insert(id, doc);
        Ok(())
    }

    async fn update(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        let id = document_id(collection, &doc)?;
        let mut guard = self.collections.write();
        match guard.get_mut(&collection).and_then(|docs| docs.get_mut(&id)) {
            Some(slot) => {
                *slot = doc;
                Ok(())
            }
            None => Err(StoreError::NotFound { collection, id }),
        }
    }

    async fn update_keeping_counters(
        &self,
        collection: Collection,
        mut doc: Document,
        keep: &[CounterPath],
    ) -> Result<(), StoreError> {
        let id = document_id(collection, &doc)?;
        let mut guard = self.collections.write();
        match guard.get_mut(&collection).and_then(|docs| docs.get_mut(&id)) {
            Some(slot) => {
                carry_counters(slot, &mut doc, keep)?;
                *slot = doc;
                Ok(())
            }
            None => Err(StoreError::NotFound { collection, id }),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        if let Some(docs) = self.collections.write().get_mut(&collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn increment_counter(
        &self,
        collection: Collection,
        id: &str,
        path: &CounterPath,
    ) -> Result<u64, StoreError> {
        let mut guard = self.collections.write();
        let doc = guard
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;
        apply_increment(doc, path)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.settings.get(key).map(|v| v.value().clone()))
    }

    async fn upsert_setting(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.settings.insert(key.to_string(), value);
        Ok(())
    }
}
