//! Blob storage for uploaded media

use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};

/// File storage used for article media and media-kit assets
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Store `bytes` under `path` and return its public URL
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, StoreError>;

    /// Remove the blob at `path`; removing an absent blob succeeds
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

/// Build a unique blob path `<prefix>/<uuid>-<sanitized name>`
#[must_use]
pub fn blob_path_for(prefix: &str, file_name: &str) -> String {
    let sanitized: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    let sanitized = if sanitized.is_empty() { "file" } else { sanitized };
    format!("{}/{}-{}", prefix.trim_matches('/'), uuid::Uuid::new_v4(), sanitized)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Process-local blob store
#[derive(Debug)]
pub struct MemoryBlobStore {
    base_url: String,
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    /// Create a store whose URLs start with `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            blobs: DashMap::new(),
        }
    }

    /// Stored bytes at `path`
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.get(path).map(|b| b.value().clone())
    }

    /// Number of stored blobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// True when no blobs are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        self.blobs.insert(path.to_string(), bytes);
        Ok(join_url(&self.base_url, path))
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.blobs.remove(path);
        Ok(())
    }
}

/// Blob store writing files under a root directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    base_url: String,
}

impl FsBlobStore {
    /// Create a store rooted at `root`, publishing URLs under `base_url`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(StoreError::Blob(format!("invalid blob path: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let len = bytes.len();
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!(path, bytes = len, "Stored blob");
        Ok(join_url(&self.base_url, path))
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
