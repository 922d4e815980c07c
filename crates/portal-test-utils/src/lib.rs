//! Testing utilities for the portal workspace
//!
//! Shared fixtures, a failure-injecting store and a manual clock.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use portal_core::{Clock, LiveHub, MemorySessionStore, PortalController};
use portal_model::{
    ArticleCategory, ArticleDraft, FeaturedMedia, FilePayload, MediaAssetCategory, MediaAssetDraft, MediaInput,
    MeetingDraft, MeetingKind,
};
use portal_store::{
    collection::document_id, BlobStore, Collection, CounterPath, Document, MemoryBlobStore, MemoryStore, PortalStore,
    StoreError,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const ADMIN_SECRET: &str = "test-admin-secret";

// ----------------------------------------------------------------------
// Clock
// ----------------------------------------------------------------------

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn clock(&self) -> Clock {
        let now = Arc::clone(&self.now);
        Arc::new(move || *now.lock())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap())
    }
}

// ----------------------------------------------------------------------
// Failure injection
// ----------------------------------------------------------------------

/// Which calls a [`FlakyStore`] fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Reads,
    Writes,
    Increments,
}

/// Store wrapper that fails chosen calls on demand
#[derive(Debug)]
pub struct FlakyStore {
    inner: Arc<dyn PortalStore>,
    fail_reads: AtomicUsize,
    fail_writes: AtomicUsize,
    fail_increments: AtomicUsize,
    atomic_increment: AtomicBool,
    increment_calls: AtomicUsize,
    interleaved: Mutex<Option<CounterPath>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn PortalStore>) -> Self {
        Self {
            inner,
            fail_reads: AtomicUsize::new(0),
            fail_writes: AtomicUsize::new(0),
            fail_increments: AtomicUsize::new(0),
            atomic_increment: AtomicBool::new(true),
            increment_calls: AtomicUsize::new(0),
            interleaved: Mutex::new(None),
        }
    }

    /// Fail the next `times` calls of the given kind
    pub fn fail_next(&self, on: FailOn, times: usize) {
        self.counter(on).store(times, Ordering::SeqCst);
    }

    /// Fail every call of the given kind until [`FlakyStore::heal`]
    pub fn fail_always(&self, on: FailOn) {
        self.fail_next(on, usize::MAX);
    }

    pub fn heal(&self) {
        for on in [FailOn::Reads, FailOn::Writes, FailOn::Increments] {
            self.fail_next(on, 0);
        }
    }

    /// Report non-atomic increments so callers use read-modify-write
    pub fn set_atomic_increment(&self, atomic: bool) {
        self.atomic_increment.store(atomic, Ordering::SeqCst);
    }

    pub fn increment_calls(&self) -> usize {
        self.increment_calls.load(Ordering::SeqCst)
    }

    /// Bump `path` on the target document right before the next replace
    /// reaches the backend, as another reader would between an edit's read
    /// and its write
    pub fn increment_during_next_update(&self, path: CounterPath) {
        *self.interleaved.lock() = Some(path);
    }

    async fn interleave(&self, collection: Collection, doc: &Document) -> Result<(), StoreError> {
        let pending = self.interleaved.lock().take();
        if let Some(path) = pending {
            let id = document_id(collection, doc)?;
            self.inner.increment_counter(collection, &id, &path).await?;
        }
        Ok(())
    }

    fn counter(&self, on: FailOn) -> &AtomicUsize {
        match on {
            FailOn::Reads => &self.fail_reads,
            FailOn::Writes => &self.fail_writes,
            FailOn::Increments => &self.fail_increments,
        }
    }

    fn check(&self, on: FailOn) -> Result<(), StoreError> {
        let counter = self.counter(on);
        let tripped = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if tripped {
            Err(StoreError::Backend(format!("injected {on:?} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PortalStore for FlakyStore {
    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        self.check(FailOn::Reads)?;
        self.inner.list_all(collection).await
    }

    async fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.check(FailOn::Reads)?;
        self.inner.get_one(collection, id).await
    }

    async fn create(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        self.check(FailOn::Writes)?;
        self.inner.create(collection, doc).await
    }

    async fn update(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        self.check(FailOn::Writes)?;
        self.interleave(collection, &doc).await?;
        self.inner.update(collection, doc).await
    }

    async fn update_keeping_counters(
        &self,
        collection: Collection,
        doc: Document,
        keep: &[CounterPath],
    ) -> Result<(), StoreError> {
        self.check(FailOn::Writes)?;
        self.interleave(collection, &doc).await?;
        self.inner.update_keeping_counters(collection, doc, keep).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.check(FailOn::Writes)?;
        self.inner.delete(collection, id).await
    }

    async fn increment_counter(
        &self,
        collection: Collection,
        id: &str,
        path: &CounterPath,
    ) -> Result<u64, StoreError> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        self.check(FailOn::Increments)?;
        self.inner.increment_counter(collection, id, path).await
    }

    fn supports_atomic_increment(&self) -> bool {
        self.atomic_increment.load(Ordering::SeqCst)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.check(FailOn::Reads)?;
        self.inner.get_setting(key).await
    }

    async fn upsert_setting(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.check(FailOn::Writes)?;
        self.inner.upsert_setting(key, value).await
    }
}

// ----------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------

pub fn linked_media() -> FeaturedMedia {
    FeaturedMedia::new("https://cdn.example.org/rally.jpg", "rally.jpg", "image/jpeg")
}

pub fn article_draft(title: &str) -> ArticleDraft {
    ArticleDraft::new(title, "First paragraph.\n\nSecond paragraph.")
        .with_category(ArticleCategory::State)
        .with_media(MediaInput::Linked(linked_media()))
}

pub fn meeting_draft(title: &str, kind: MeetingKind, starts_at: DateTime<Utc>) -> MeetingDraft {
    MeetingDraft::new(title, kind)
        .at(starts_at)
        .located("Town Hall")
        .described("Agenda to follow")
}

pub fn pdf_payload(name: &str) -> FilePayload {
    FilePayload::new(name, "application/pdf", b"%PDF-1.7 test".to_vec())
}

pub fn media_asset_draft(title: &str) -> MediaAssetDraft {
    MediaAssetDraft::new(title)
        .with_category(MediaAssetCategory::Banner)
        .with_file(pdf_payload("release.pdf"))
}

// ----------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------

/// Backends shared by every controller built from one harness
#[derive(Debug, Clone)]
pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub live: Arc<LiveHub>,
    pub clock: ManualClock,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(FlakyStore::new(Arc::new(MemoryStore::new()))),
            blobs: Arc::new(MemoryBlobStore::new("/media")),
            live: Arc::new(LiveHub::new()),
            clock: ManualClock::default(),
        }
    }

    /// A signed-out controller over the shared backends
    pub fn controller(&self) -> PortalController {
        PortalController::builder(Arc::clone(&self.store) as Arc<dyn PortalStore>)
            .with_admin_secret(ADMIN_SECRET)
            .with_blob_store(Arc::clone(&self.blobs) as Arc<dyn BlobStore>)
            .with_session_store(Arc::new(MemorySessionStore::new()))
            .with_live_hub(Arc::clone(&self.live))
            .with_clock(self.clock.clock())
            .with_counter_retries(1)
            .build()
            .unwrap()
    }

    pub async fn admin(&self) -> PortalController {
        let portal = self.controller();
        portal.sign_in_admin(ADMIN_SECRET).await.unwrap();
        portal
    }

    pub async fn guest(&self, name: &str) -> PortalController {
        let portal = self.controller();
        portal.sign_in_guest(name).await.unwrap();
        portal
    }
}
