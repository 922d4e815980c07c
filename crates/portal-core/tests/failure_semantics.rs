//! Persistence failures, rollbacks and sign-out races

use async_trait::async_trait;
use portal_core::{AuthStatus, CounterOutcome, ErrorKind, PortalController, PortalError, View};
use portal_model::{Article, ArticleDraft, CounterOverride, ValidationError};
use portal_store::{Collection, CounterPath, Document, MemoryStore, PortalStore, RecordStore, StoreError};
use portal_test_utils::{article_draft, media_asset_draft, FailOn, Harness, ADMIN_SECRET};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Notify;

#[tokio::test]
async fn validation_runs_before_any_store_call() {
    let h = Harness::new();
    let admin = h.admin().await;
    admin.navigate(View::ManageArticle).await.unwrap();
    h.store.fail_always(FailOn::Writes);

    let err = admin.create_article(ArticleDraft::new("", "Body")).await.unwrap_err();
    match err {
        PortalError::Validation(ValidationError::IncompleteArticle { missing }) => {
            assert_eq!(missing, vec!["title", "media"]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let state = admin.state();
    assert_eq!(state.view, View::ManageArticle);
    assert_eq!(
        state.form_error.as_deref(),
        Some("All fields including the featured media file are required to publish a post.")
    );
}

#[tokio::test]
async fn failed_create_keeps_form_open_for_retry() {
    let h = Harness::new();
    let admin = h.admin().await;
    admin.navigate(View::ManageArticle).await.unwrap();

    h.store.fail_next(FailOn::Writes, 1);
    let err = admin.create_article(article_draft("Retry me")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(err.is_retryable());

    let state = admin.state();
    assert_eq!(state.view, View::ManageArticle);
    assert!(state.articles.is_empty());
    assert!(state.form_error.is_some());

    admin.create_article(article_draft("Retry me")).await.unwrap();
    let state = admin.state();
    assert_eq!(state.view, View::Feed);
    assert_eq!(state.articles.len(), 1);
    assert!(state.form_error.is_none());
}

#[tokio::test]
async fn failed_record_write_discards_uploaded_blob() {
    let h = Harness::new();
    let admin = h.admin().await;

    h.store.fail_next(FailOn::Writes, 1);
    assert!(admin.upload_media_asset(media_asset_draft("Kit")).await.is_err());
    assert!(h.blobs.is_empty());
    assert!(admin.state().media_assets.is_empty());
}

#[tokio::test]
async fn load_is_all_or_nothing() {
    let h = Harness::new();
    let admin = h.admin().await;
    admin.create_article(article_draft("One")).await.unwrap();

    let writer = h.admin().await;
    writer.create_article(article_draft("Two")).await.unwrap();

    h.store.fail_next(FailOn::Reads, 1);
    assert!(admin.load_data().await.is_err());
    let state = admin.state();
    assert_eq!(state.articles.len(), 1);
    assert!(state.last_load_error.is_some());
    assert!(state.loaded);

    admin.load_data().await.unwrap();
    let state = admin.state();
    assert_eq!(state.articles.len(), 2);
    assert!(state.last_load_error.is_none());
}

#[tokio::test]
async fn first_load_failure_keeps_placeholders() {
    let h = Harness::new();
    let portal = h.controller();
    h.store.fail_next(FailOn::Reads, 1);
    portal.sign_in_admin(ADMIN_SECRET).await.unwrap();

    let state = portal.state();
    assert!(state.auth.is_admin());
    assert!(!state.loaded);
    assert!(state.last_load_error.is_some());
    assert!(matches!(portal.screen(), portal_core::Screen::Loading(_)));

    portal.load_data().await.unwrap();
    assert_eq!(portal.screen(), portal_core::Screen::Ready(View::Feed));
}

#[tokio::test]
async fn counter_failure_rolls_back_after_retries() {
    let h = Harness::new();
    let admin = h.admin().await;
    let article = admin.create_article(article_draft("Counted")).await.unwrap();

    h.store.fail_always(FailOn::Increments);
    let outcome = admin.select_article(&article.id).await.unwrap();
    h.store.heal();

    assert_eq!(outcome, CounterOutcome::RolledBack);
    // one attempt plus one retry
    assert_eq!(h.store.increment_calls(), 2);
    let state = admin.state();
    assert_eq!(state.articles[0].views, 0);
    assert_eq!(state.selected_article.as_ref().unwrap().views, 0);
    assert!(state.form_error.is_none());
}

#[tokio::test]
async fn counter_retry_recovers() {
    let h = Harness::new();
    let admin = h.admin().await;
    let article = admin.create_article(article_draft("Counted")).await.unwrap();

    h.store.fail_next(FailOn::Increments, 1);
    let outcome = admin.increment_link_click(&article.id, "insta").await.unwrap();
    assert_eq!(outcome, CounterOutcome::Persisted(1));
    assert_eq!(admin.state().articles[0].link_clicks.insta, 1);
}

#[tokio::test]
async fn counter_on_deleted_article_rolls_back_without_retry() {
    let h = Harness::new();
    let admin = h.admin().await;
    let article = admin.create_article(article_draft("Gone soon")).await.unwrap();

    h.store.delete_record::<Article>(&article.id).await.unwrap();
    let outcome = admin.increment_view(&article.id).await.unwrap();

    assert_eq!(outcome, CounterOutcome::RolledBack);
    assert_eq!(h.store.increment_calls(), 1);
    assert_eq!(admin.state().articles[0].views, 0);
}

#[tokio::test]
async fn saturated_counter_never_wraps() {
    let h = Harness::new();
    let admin = h.admin().await;
    let article = admin.create_article(article_draft("Viral")).await.unwrap();
    let reader = h.guest("Asha").await;
    admin
        .update_article(
            &article.id,
            ArticleDraft::new("Viral", "Body"),
            CounterOverride {
                views: Some(u64::MAX),
                link_clicks: None,
            },
        )
        .await
        .unwrap();

    // A current local copy is refused before any store call
    let err = admin.increment_view(&article.id).await.unwrap_err();
    assert!(matches!(err, PortalError::Store(StoreError::InvalidCounter { .. })));
    assert_eq!(h.store.increment_calls(), 0);
    assert_eq!(admin.state().articles[0].views, u64::MAX);

    // A stale copy reaches the store, which refuses without retrying
    assert_eq!(reader.increment_view(&article.id).await.unwrap(), CounterOutcome::RolledBack);
    assert_eq!(h.store.increment_calls(), 1);
    h.store.set_atomic_increment(false);
    assert_eq!(reader.increment_view(&article.id).await.unwrap(), CounterOutcome::RolledBack);
    assert_eq!(reader.state().articles[0].views, 0);

    let stored: Article = h.store.get_record(&article.id).await.unwrap().unwrap();
    assert_eq!(stored.views, u64::MAX);
}

#[tokio::test]
async fn non_atomic_backend_uses_read_modify_write() {
    let h = Harness::new();
    let admin = h.admin().await;
    let article = admin.create_article(article_draft("Counted")).await.unwrap();

    h.store.set_atomic_increment(false);
    admin.increment_link_click(&article.id, "x").await.unwrap();
    admin.increment_link_click(&article.id, "x").await.unwrap();
    assert_eq!(h.store.increment_calls(), 0);

    let stored: Article = h.store.get_record(&article.id).await.unwrap().unwrap();
    assert_eq!(stored.link_clicks.x, 2);
}

#[tokio::test]
async fn unknown_platform_never_reaches_store() {
    let h = Harness::new();
    let guest = {
        let admin = h.admin().await;
        admin.create_article(article_draft("A")).await.unwrap();
        h.guest("Asha").await
    };
    let id = guest.state().articles[0].id.clone();

    let err = guest.increment_link_click(&id, "myspace").await.unwrap_err();
    assert!(matches!(err, PortalError::Validation(ValidationError::UnknownPlatform(_))));
    assert_eq!(h.store.increment_calls(), 0);
}

#[tokio::test]
async fn signed_out_controller_refuses_everything() {
    let h = Harness::new();
    let portal = h.controller();
    let id = portal_model::RecordId::from("missing");

    assert!(matches!(portal.increment_view(&id).await, Err(PortalError::Unauthorized { .. })));
    assert!(matches!(portal.navigate(View::Feed).await, Err(PortalError::Unauthorized { .. })));
    assert!(matches!(portal.join_live_stream(), Err(PortalError::Unauthorized { .. })));
    assert!(matches!(portal.sign_out().await, Err(PortalError::InvalidTransition { .. })));
    assert_eq!(portal.auth_status(), AuthStatus::Unauthenticated);
}

#[tokio::test]
async fn second_sign_in_is_an_invalid_transition() {
    let h = Harness::new();
    let admin = h.admin().await;
    let err = admin.sign_in_guest("Asha").await.unwrap_err();
    assert!(matches!(err, PortalError::InvalidTransition { .. }));
    assert!(admin.auth_status().is_admin());
}

/// Store whose `create` parks until released
#[derive(Debug)]
struct GatedStore {
    inner: MemoryStore,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl PortalStore for GatedStore {
    fn backend_name(&self) -> &'static str {
        "gated"
    }

    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        self.inner.list_all(collection).await
    }

    async fn get_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get_one(collection, id).await
    }

    async fn create(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        if collection == Collection::Articles {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.create(collection, doc).await
    }

    async fn update(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        self.inner.update(collection, doc).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id).await
    }

    async fn increment_counter(
        &self,
        collection: Collection,
        id: &str,
        path: &CounterPath,
    ) -> Result<u64, StoreError> {
        self.inner.increment_counter(collection, id, path).await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get_setting(key).await
    }

    async fn upsert_setting(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.inner.upsert_setting(key, value).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completion_after_sign_out_is_discarded() {
    let store = Arc::new(GatedStore {
        inner: MemoryStore::new(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let portal = Arc::new(
        PortalController::builder(Arc::clone(&store) as Arc<dyn PortalStore>)
            .with_admin_secret(ADMIN_SECRET)
            .build()
            .unwrap(),
    );
    portal.sign_in_admin(ADMIN_SECRET).await.unwrap();

    let pending = {
        let portal = Arc::clone(&portal);
        tokio::spawn(async move { portal.create_article(article_draft("Late")).await })
    };
    store.entered.notified().await;
    portal.sign_out().await.unwrap();
    store.release.notify_one();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(PortalError::Stale)));

    // The write itself landed; only the reload and navigation were dropped
    let state = portal.state();
    assert_eq!(state.auth, AuthStatus::Unauthenticated);
    assert!(state.articles.is_empty());
    assert!(!state.loaded);
    assert!(state.form_error.is_none());
    let stored: Vec<Article> = store.list_records().await.unwrap();
    assert_eq!(stored.len(), 1);
}
