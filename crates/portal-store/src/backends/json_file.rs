//! Embedded store persisting each collection to a JSON file
//!
//! Layout under the data directory:
//! ```text
//! <dir>/articles.json
//! <dir>/meetings.json
//! <dir>/media_assets.json
//! <dir>/guests.json
//! <dir>/settings.json
//! ```
//!
//! Writes go to `<file>.tmp` first and are renamed into place. All mutations
//! are serialized through one async mutex, which makes `increment_counter`
//! atomic within the process.

use crate::collection::{apply_increment, carry_counters, document_id, Collection, CounterPath, Document};
use crate::error::StoreError;
use crate::store::PortalStore;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Default)]
struct Contents {
    collections: HashMap<Collection, BTreeMap<String, Document>>,
    settings: Map<String, Value>,
}

/// `PortalStore` backed by JSON files in a directory
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    contents: Mutex<Contents>,
}

impl JsonFileStore {
    /// Open (or create) a store rooted at `dir`, loading any existing files
    ///
    /// # Errors
    /// `StoreError::Io` if the directory cannot be created or read,
    /// `StoreError::Decode` if a file is not valid JSON of the expected shape.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let mut contents = Contents::default();
        for collection in Collection::ALL {
            let path = dir.join(file_name(collection));
            if let Some(raw) = read_optional(&path).await? {
                let docs: Vec<Document> =
                    serde_json::from_str(&raw).map_err(|e| StoreError::decode(collection, e))?;
                let mut by_id = BTreeMap::new();
                for doc in docs {
                    by_id.insert(document_id(collection, &doc)?, doc);
                }
                contents.collections.insert(collection, by_id);
            }
        }
        if let Some(raw) = read_optional(&dir.join(SETTINGS_FILE)).await? {
            contents.settings =
                serde_json::from_str(&raw).map_err(|e| StoreError::decode("settings", e))?;
        }

        tracing::info!(
            dir = %dir.display(),
            collections = contents.collections.len(),
            "Opened JSON file store"
        );

        Ok(Self {
            dir,
            contents: Mutex::new(contents),
        })
    }

    /// Data directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn persist_collection(&self, collection: Collection, contents: &Contents) -> Result<(), StoreError> {
        let docs: Vec<&Document> = contents
            .collections
            .get(&collection)
            .map(|docs| docs.values().collect())
            .unwrap_or_default();
        let raw = serde_json::to_string_pretty(&docs).map_err(|e| StoreError::decode(collection, e))?;
        write_atomic(&self.dir.join(file_name(collection)), raw.as_bytes()).await
    }

    async fn persist_settings(&self, contents: &Contents) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(&contents.settings)
            .map_err(|e| StoreError::decode("settings", e))?;
        write_atomic(&self.dir.join(SETTINGS_FILE), raw.as_bytes()).await
    }
}

fn file_name(collection: Collection) -> String {
    format!("{}.json", collection.name())
}

async fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Persisted");
    Ok(())
}

#[async_trait]
impl PortalStore for JsonFileStore {
    fn backend_name(&self) -> &'static str {
        "json"
    }

    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let contents = self.contents.lock().await;
        Ok(contents
            .collections
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let contents = self.contents.lock().await;
        Ok(contents
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id).cloned()))
    }

    async fn create(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        let id = document_id(collection, &doc)?;
        let mut contents = self.contents.lock().await;
        let docs = contents.collections.entry(collection).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::Duplicate { collection, id });
        }
        docs.insert(id.clone(), doc);

        if let Err(e) = self.persist_collection(collection, &contents).await {
            if let Some(docs) = contents.collections.get_mut(&collection) {
                docs.remove(&id);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn update(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        let id = document_id(collection, &doc)?;
        let mut contents = self.contents.lock().await;
        let previous = match contents.collections.get_mut(&collection).and_then(|d| d.get_mut(&id)) {
            Some(slot) => std::mem::replace(slot, doc),
            None => return Err(StoreError::NotFound { collection, id }),
        };

        if let Err(e) = self.persist_collection(collection, &contents).await {
            if let Some(slot) = contents.collections.get_mut(&collection).and_then(|d| d.get_mut(&id)) {
                *slot = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn update_keeping_counters(
        &self,
        collection: Collection,
        mut doc: Document,
        keep: &[CounterPath],
    ) -> Result<(), StoreError> {
        let id = document_id(collection, &doc)?;
        let mut contents = self.contents.lock().await;
        let previous = match contents.collections.get_mut(&collection).and_then(|d| d.get_mut(&id)) {
            Some(slot) => {
                carry_counters(slot, &mut doc, keep)?;
                std::mem::replace(slot, doc)
            }
            None => return Err(StoreError::NotFound { collection, id }),
        };

        if let Err(e) = self.persist_collection(collection, &contents).await {
            if let Some(slot) = contents.collections.get_mut(&collection).and_then(|d| d.get_mut(&id)) {
                *slot = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut contents = self.contents.lock().await;
        let removed = contents
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id));
        let Some(removed) = removed else {
            return Ok(());
        };

        if let Err(e) = self.persist_collection(collection, &contents).await {
            contents
                .collections
                .entry(collection)
                .or_default()
                .insert(id.to_string(), removed);
            return Err(e);
        }
        Ok(())
    }

    async fn increment_counter(
        &self,
        collection: Collection,
        id: &str,
        path: &CounterPath,
    ) -> Result<u64, StoreError> {
        let mut contents = self.contents.lock().await;
        let doc = contents
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;
        let previous = doc.clone();
        let next = apply_increment(doc, path)?;

        if let Err(e) = self.persist_collection(collection, &contents).await {
            if let Some(slot) = contents.collections.get_mut(&collection).and_then(|d| d.get_mut(id)) {
                *slot = previous;
            }
            return Err(e);
        }
        Ok(next)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.contents.lock().await.settings.get(key).cloned())
    }

    async fn upsert_setting(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut contents = self.contents.lock().await;
        let previous = contents.settings.insert(key.to_string(), value);

        if let Err(e) = self.persist_settings(&contents).await {
            match previous {
                Some(old) => contents.settings.insert(key.to_string(), old),
                None => contents.settings.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}
