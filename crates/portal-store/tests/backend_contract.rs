//! Backend contract tests
//!
//! Every `PortalStore` backend must pass the same checks.
//! Run with: cargo test --package portal-store --test backend_contract

use chrono::Utc;
use portal_model::{Article, ArticleDraft, FeaturedMedia, MediaInput, Platform, RecordId, SocialLinks};
use portal_store::{Collection, CounterPath, JsonFileStore, MemoryStore, PortalStore, RecordStore, StoreError};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn sample_article(title: &str) -> Article {
    let media = FeaturedMedia::new("https://cdn.example/a.jpg", "a.jpg", "image/jpeg");
    ArticleDraft::new(title, "Body")
        .with_media(MediaInput::Linked(media.clone()))
        .into_article(media, Utc::now())
}

async fn crud_round(store: &dyn PortalStore) {
    let article = sample_article("First");
    store.create_record(&article).await.unwrap();

    let loaded: Article = store.get_record(&article.id).await.unwrap().unwrap();
    assert_eq!(loaded, article);

    let mut edited = loaded.clone();
    edited.title = "Edited".to_string();
    store.update_record(&edited).await.unwrap();
    let all: Vec<Article> = store.list_records().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Edited");

    let dup = store.create_record(&article).await.unwrap_err();
    assert!(matches!(dup, StoreError::Duplicate { .. }));

    store.delete_record::<Article>(&article.id).await.unwrap();
    store.delete_record::<Article>(&article.id).await.unwrap();
    assert!(store.get_record::<Article>(&article.id).await.unwrap().is_none());

    let missing = store.update_record(&article).await.unwrap_err();
    assert!(missing.is_not_found());
}

async fn counter_round(store: Arc<dyn PortalStore>) {
    let article = sample_article("Counted");
    store.create_record(&article).await.unwrap();

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let store = Arc::clone(&store);
            let id = article.id.clone();
            tokio::spawn(async move {
                let path = if i % 2 == 0 {
                    CounterPath::Views
                } else {
                    CounterPath::LinkClick(Platform::X)
                };
                store.increment_counter(Collection::Articles, id.as_str(), &path).await
            })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let stored: Article = store.get_record(&article.id).await.unwrap().unwrap();
    assert_eq!(stored.views, 5);
    assert_eq!(stored.link_clicks.x, 5);
    assert_eq!(stored.link_clicks.fb, 0);

    let err = store
        .increment_counter(Collection::Articles, "missing", &CounterPath::Views)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

async fn edit_keeps_counters_round(store: &dyn PortalStore) {
    let article = sample_article("Busy");
    store.create_record(&article).await.unwrap();
    let snapshot: Article = store.get_record(&article.id).await.unwrap().unwrap();

    for path in [CounterPath::Views, CounterPath::Views, CounterPath::LinkClick(Platform::Facebook)] {
        store
            .increment_counter(Collection::Articles, article.id.as_str(), &path)
            .await
            .unwrap();
    }

    let mut edited = snapshot;
    edited.title = "Busy, edited".to_string();
    let doc = serde_json::to_value(&edited).unwrap();
    store
        .update_keeping_counters(Collection::Articles, doc, &CounterPath::ARTICLE)
        .await
        .unwrap();

    let stored: Article = store.get_record(&article.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Busy, edited");
    assert_eq!(stored.views, 2);
    assert_eq!(stored.link_clicks.fb, 1);

    // Counters left out of `keep` take the replacement's value
    edited.views = 40;
    let doc = serde_json::to_value(&edited).unwrap();
    store
        .update_keeping_counters(Collection::Articles, doc, &CounterPath::ARTICLE[1..])
        .await
        .unwrap();
    let stored: Article = store.get_record(&article.id).await.unwrap().unwrap();
    assert_eq!(stored.views, 40);
    assert_eq!(stored.link_clicks.fb, 1);

    let missing = serde_json::to_value(sample_article("Missing")).unwrap();
    let err = store
        .update_keeping_counters(Collection::Articles, missing, &CounterPath::ARTICLE)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

async fn settings_round(store: &dyn PortalStore) {
    assert!(store.get_typed_setting::<SocialLinks>(SocialLinks::KEY).await.unwrap().is_none());

    let links = SocialLinks {
        fb: Some("https://fb.example/page".to_string()),
        ..SocialLinks::default()
    };
    store.put_typed_setting(SocialLinks::KEY, &links).await.unwrap();
    store.put_typed_setting(SocialLinks::KEY, &links).await.unwrap();

    let read: SocialLinks = store.get_typed_setting(SocialLinks::KEY).await.unwrap().unwrap();
    assert_eq!(read, links);
}

async fn decode_errors_surface(store: &dyn PortalStore) {
    store
        .create(Collection::Articles, json!({"id": "broken", "title": 42}))
        .await
        .unwrap();
    let err = store.get_record::<Article>(&RecordId::from("broken")).await.unwrap_err();
    assert!(matches!(err, StoreError::Decode { .. }));
}

#[tokio::test]
async fn memory_backend_contract() {
    crud_round(&MemoryStore::new()).await;
    counter_round(Arc::new(MemoryStore::new())).await;
    edit_keeps_counters_round(&MemoryStore::new()).await;
    settings_round(&MemoryStore::new()).await;
    decode_errors_surface(&MemoryStore::new()).await;
}

#[tokio::test]
async fn json_backend_contract() {
    let dirs: Vec<_> = (0..5).map(|_| tempfile::tempdir().unwrap()).collect();

    crud_round(&JsonFileStore::open(dirs[0].path()).await.unwrap()).await;
    counter_round(Arc::new(JsonFileStore::open(dirs[1].path()).await.unwrap())).await;
    settings_round(&JsonFileStore::open(dirs[2].path()).await.unwrap()).await;
    decode_errors_surface(&JsonFileStore::open(dirs[3].path()).await.unwrap()).await;
    edit_keeps_counters_round(&JsonFileStore::open(dirs[4].path()).await.unwrap()).await;
}

#[tokio::test]
async fn json_backend_counters_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let article = sample_article("Durable");
    {
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store.create_record(&article).await.unwrap();
        for _ in 0..3 {
            store
                .increment_counter(Collection::Articles, article.id.as_str(), &CounterPath::LinkClick(Platform::Instagram))
                .await
                .unwrap();
        }
    }

    let reopened = JsonFileStore::open(dir.path()).await.unwrap();
    let stored: Article = reopened.get_record(&article.id).await.unwrap().unwrap();
    assert_eq!(stored.link_clicks.insta, 3);
}
