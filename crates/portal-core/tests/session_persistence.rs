//! Session scopes and the file-backed configuration path

use chrono::Duration;
use portal_core::{
    AuthStatus, BackendKind, FileSessionStore, PortalConfig, PortalController, Section, SessionScope, SessionStore,
    View,
};
use portal_model::{ArticleDraft, FilePayload, MediaInput};
use portal_store::{MemoryStore, PortalStore};
use portal_test_utils::{article_draft, ADMIN_SECRET};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

fn controller_with(store: &Arc<MemoryStore>, sessions: Arc<dyn SessionStore>) -> PortalController {
    PortalController::builder(Arc::clone(store) as Arc<dyn PortalStore>)
        .with_admin_secret(ADMIN_SECRET)
        .with_session_store(sessions)
        .build()
        .unwrap()
}

#[tokio::test]
async fn browser_scope_survives_restart() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let sessions = || Arc::new(FileSessionStore::new(dir.path(), SessionScope::Browser)) as Arc<dyn SessionStore>;

    let first = controller_with(&store, sessions());
    first.sign_in_guest("Asha").await.unwrap();
    first.navigate(View::Meetings).await.unwrap();

    let second = controller_with(&store, sessions());
    let restored = second.restore_session().await.unwrap();
    assert_eq!(
        restored,
        AuthStatus::Guest {
            name: "Asha".to_string()
        }
    );
    let state = second.state();
    assert!(state.loaded);
    assert!(state.seen.visits().contains_key(&Section::Meetings));

    second.sign_out().await.unwrap();
    let third = controller_with(&store, sessions());
    assert_eq!(third.restore_session().await.unwrap(), AuthStatus::Unauthenticated);
}

#[tokio::test]
async fn tab_scope_forgets_on_restart() {
    let store = Arc::new(MemoryStore::new());
    let first = PortalController::builder(Arc::clone(&store) as Arc<dyn PortalStore>)
        .with_admin_secret(ADMIN_SECRET)
        .build()
        .unwrap();
    first.sign_in_admin(ADMIN_SECRET).await.unwrap();

    let second = PortalController::builder(store as Arc<dyn PortalStore>)
        .with_admin_secret(ADMIN_SECRET)
        .build()
        .unwrap();
    assert_eq!(second.restore_session().await.unwrap(), AuthStatus::Unauthenticated);
}

#[tokio::test]
async fn expired_durable_token_is_not_restored() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let expired = Arc::new(
        FileSessionStore::new(dir.path(), SessionScope::DurableToken).with_ttl(Duration::seconds(-1)),
    );

    let first = controller_with(&store, expired.clone());
    first.sign_in_admin(ADMIN_SECRET).await.unwrap();
    assert!(dir.path().join("session.json").exists());

    let second = controller_with(&store, expired);
    assert_eq!(second.restore_session().await.unwrap(), AuthStatus::Unauthenticated);
    assert!(!dir.path().join("session.json").exists());
}

#[tokio::test]
async fn blocked_guest_is_not_restored() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let sessions = || Arc::new(FileSessionStore::new(dir.path(), SessionScope::Browser)) as Arc<dyn SessionStore>;

    let guest = controller_with(&store, sessions());
    guest.sign_in_guest("Troll").await.unwrap();

    let admin = controller_with(&store, Arc::new(portal_core::MemorySessionStore::new()));
    admin.sign_in_admin(ADMIN_SECRET).await.unwrap();
    admin.set_guest_blocked("Troll", true).await.unwrap();

    let restarted = controller_with(&store, sessions());
    assert_eq!(restarted.restore_session().await.unwrap(), AuthStatus::Unauthenticated);
    assert!(!dir.path().join("session.json").exists());
}

#[tokio::test]
async fn json_backend_from_config_persists_everything() {
    let dir = TempDir::new().unwrap();
    let config = PortalConfig::new(ADMIN_SECRET)
        .with_backend(BackendKind::Json)
        .with_data_dir(dir.path())
        .with_session_scope(SessionScope::Browser);

    let article_id = {
        let portal = PortalController::from_config(&config).await.unwrap();
        portal.sign_in_admin(ADMIN_SECRET).await.unwrap();
        portal.create_article(article_draft("Linked")).await.unwrap();

        let payload = FilePayload::from_data_url("banner.png", "data:image/png;base64,iVBORw0K").unwrap();
        let uploaded = portal
            .create_article(ArticleDraft::new("Uploaded", "Body").with_media(MediaInput::Upload(payload)))
            .await
            .unwrap();
        let path = uploaded.featured_media.storage_path.clone().unwrap();
        assert!(config.blob_dir().join(&path).exists());
        assert!(uploaded.featured_media.url.starts_with("/media/articles/"));
        uploaded.id
    };

    assert!(config.store_dir().join("articles.json").exists());

    let reopened = PortalController::from_config(&config).await.unwrap();
    assert_eq!(reopened.restore_session().await.unwrap(), AuthStatus::Admin);
    let state = reopened.state();
    assert_eq!(state.articles.len(), 2);
    assert!(state.article(&article_id).is_some());

    reopened.delete_article(&article_id).await.unwrap();
    let blobs: Vec<_> = std::fs::read_dir(config.blob_dir().join("articles"))
        .unwrap()
        .collect();
    assert!(blobs.is_empty());
}

#[tokio::test]
async fn missing_secret_is_a_config_error() {
    let config = PortalConfig::new("");
    let err = PortalController::from_config(&config).await.unwrap_err();
    assert!(matches!(err, portal_core::PortalError::Config(_)));
}
