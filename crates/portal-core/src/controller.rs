//! The portal controller
//!
//! Single owner of [`AppState`]. Every handler follows the same shape:
//! check the auth state, validate input, call the persistence collaborator,
//! reload, then navigate. State lives behind a `parking_lot::RwLock` that is
//! never held across an `.await`.
//!
//! Sign-in and sign-out bump a session epoch. Work that was started under an
//! older epoch discards its completion and reports [`PortalError::Stale`].

use crate::auth::{validate_transition, AuthStatus, Authenticator, StoreAuthenticator};
use crate::config::{BackendKind, ConfigError, PortalConfig};
use crate::error::{AuthError, ErrorKind, PortalError};
use crate::live::{ChatMessage, LiveHub, LiveNotice, LiveSession};
use crate::notifications::{SeenTracker, UnseenBadges};
use crate::session::{FileSessionStore, MemorySessionStore, SessionScope, SessionStore};
use crate::state::AppState;
use crate::view::{Screen, View};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use portal_model::{
    Article, ArticleDraft, CounterOverride, FeaturedMedia, FileDescriptor, FilePayload, Guest, MediaAsset,
    MediaAssetCategory, MediaAssetDraft, MediaInput, Meeting, MeetingDraft, MeetingKind, MeetingPartition,
    Platform, RecordId, SocialLinks, ValidationError,
};
use portal_store::{
    blob_path_for, BlobStore, Collection, CounterPath, FsBlobStore, JsonFileStore, MemoryBlobStore, MemoryStore,
    PortalStore, RecordStore, StoreError,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const ARTICLE_BLOB_PREFIX: &str = "articles";
const MEDIA_KIT_BLOB_PREFIX: &str = "media-kit";

/// Result of an optimistic counter increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOutcome {
    /// Stored; carries the backend's new value
    Persisted(u64),
    /// Every attempt failed; the in-memory +1 was undone
    RolledBack,
    /// The session changed before the store answered
    Discarded,
}

/// Builder for [`PortalController`]
pub struct PortalControllerBuilder {
    store: Arc<dyn PortalStore>,
    blobs: Option<Arc<dyn BlobStore>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    admin_secret: Option<String>,
    sessions: Option<Arc<dyn SessionStore>>,
    live: Option<Arc<LiveHub>>,
    clock: Option<Clock>,
    counter_retries: u32,
}

impl PortalControllerBuilder {
    /// With blob store (default: in-memory)
    #[must_use]
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// With authentication collaborator
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// With admin secret, used when no authenticator is given
    #[must_use]
    pub fn with_admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.admin_secret = Some(secret.into());
        self
    }

    /// With session store (default: tab scope)
    #[must_use]
    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Share a live hub with other controllers
    #[must_use]
    pub fn with_live_hub(mut self, live: Arc<LiveHub>) -> Self {
        self.live = Some(live);
        self
    }

    /// With clock
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// With extra attempts for counter increments
    #[must_use]
    pub fn with_counter_retries(mut self, retries: u32) -> Self {
        self.counter_retries = retries;
        self
    }

    /// Build the controller
    ///
    /// # Errors
    /// `ConfigError::Missing` when neither an authenticator nor an admin secret was given.
    pub fn build(self) -> Result<PortalController, PortalError> {
        let authenticator: Arc<dyn Authenticator> = match (self.authenticator, self.admin_secret) {
            (Some(authenticator), _) => authenticator,
            (None, Some(secret)) if !secret.is_empty() => {
                let authenticator = StoreAuthenticator::new(Arc::clone(&self.store), &secret);
                tracing::info!(
                    backend = self.store.backend_name(),
                    admin_fingerprint = %authenticator.fingerprint(),
                    "Admin credential configured"
                );
                Arc::new(authenticator)
            }
            (None, _) => return Err(ConfigError::Missing("PORTAL_ADMIN_SECRET").into()),
        };

        Ok(PortalController {
            store: self.store,
            blobs: self.blobs.unwrap_or_else(|| Arc::new(MemoryBlobStore::default())),
            authenticator,
            sessions: self.sessions.unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
            live: self.live.unwrap_or_default(),
            clock: self.clock.unwrap_or_else(|| Arc::new(Utc::now)),
            counter_retries: self.counter_retries,
            state: RwLock::new(AppState::new()),
            epoch: AtomicU64::new(0),
        })
    }
}

/// Owns the application state and mediates between the view layer and the store
pub struct PortalController {
    store: Arc<dyn PortalStore>,
    blobs: Arc<dyn BlobStore>,
    authenticator: Arc<dyn Authenticator>,
    sessions: Arc<dyn SessionStore>,
    live: Arc<LiveHub>,
    clock: Clock,
    counter_retries: u32,
    state: RwLock<AppState>,
    epoch: AtomicU64,
}

impl std::fmt::Debug for PortalController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalController")
            .field("backend", &self.store.backend_name())
            .field("session_scope", &self.sessions.scope())
            .field("auth", &self.state.read().auth)
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}

impl PortalController {
    /// Start building a controller over `store`
    #[must_use]
    pub fn builder(store: Arc<dyn PortalStore>) -> PortalControllerBuilder {
        PortalControllerBuilder {
            store,
            blobs: None,
            authenticator: None,
            admin_secret: None,
            sessions: None,
            live: None,
            clock: None,
            counter_retries: 2,
        }
    }

    /// Open the configured backends and build a controller
    ///
    /// # Errors
    /// Store open failures and missing admin secret.
    pub async fn from_config(config: &PortalConfig) -> Result<Self, PortalError> {
        let (store, blobs): (Arc<dyn PortalStore>, Arc<dyn BlobStore>) = match config.backend {
            BackendKind::Memory => (
                Arc::new(MemoryStore::new()),
                Arc::new(MemoryBlobStore::new(&config.public_base_url)),
            ),
            BackendKind::Json => (
                Arc::new(JsonFileStore::open(config.store_dir()).await?),
                Arc::new(FsBlobStore::new(config.blob_dir(), &config.public_base_url)),
            ),
        };

        let sessions: Arc<dyn SessionStore> = match config.session_scope {
            SessionScope::Tab => Arc::new(MemorySessionStore::new()),
            scope => {
                let ttl_secs = u32::try_from(config.session_ttl_secs).unwrap_or(u32::MAX);
                Arc::new(
                    FileSessionStore::new(config.session_dir(), scope).with_ttl(Duration::seconds(i64::from(ttl_secs))),
                )
            }
        };

        tracing::info!(
            backend = %config.backend,
            session_scope = %config.session_scope,
            data_dir = %config.data_dir.display(),
            "Portal configured"
        );

        Self::builder(store)
            .with_blob_store(blobs)
            .with_session_store(sessions)
            .with_admin_secret(config.admin_secret.clone())
            .with_counter_retries(config.counter_retries)
            .build()
    }

    // ------------------------------------------------------------------
    // Read-only accessors
    // ------------------------------------------------------------------

    /// Snapshot of the whole state
    #[must_use]
    pub fn state(&self) -> AppState {
        self.state.read().clone()
    }

    /// What to render
    #[must_use]
    pub fn screen(&self) -> Screen {
        self.state.read().screen()
    }

    /// Current auth status
    #[must_use]
    pub fn auth_status(&self) -> AuthStatus {
        self.state.read().auth.clone()
    }

    /// Current view
    #[must_use]
    pub fn view(&self) -> View {
        self.state.read().view
    }

    /// Unseen badges
    #[must_use]
    pub fn badges(&self) -> UnseenBadges {
        self.state.read().badges()
    }

    /// Upcoming and past entries of one kind at the current time
    #[must_use]
    pub fn meeting_partition(&self, kind: MeetingKind) -> MeetingPartition {
        self.state.read().meeting_partition(kind, self.now())
    }

    /// Media assets passing the current filter
    #[must_use]
    pub fn filtered_media(&self) -> Vec<MediaAsset> {
        self.state.read().filtered_media().into_iter().cloned().collect()
    }

    /// Live banner, if a stream runs
    #[must_use]
    pub fn live_notice(&self) -> Option<LiveNotice> {
        self.live.notice()
    }

    /// The running stream with its chat
    #[must_use]
    pub fn live_session(&self) -> Option<LiveSession> {
        self.live.snapshot()
    }

    /// Shared live hub
    #[must_use]
    pub fn live_hub(&self) -> &Arc<LiveHub> {
        &self.live
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn PortalStore> {
        &self.store
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn ensure_epoch(&self, epoch: u64) -> Result<(), PortalError> {
        if self.epoch() == epoch {
            Ok(())
        } else {
            tracing::debug!(epoch, current = self.epoch(), "Discarding completion from an earlier session");
            Err(PortalError::Stale)
        }
    }

    fn admin_epoch(&self, action: &'static str) -> Result<u64, PortalError> {
        let state = self.state.read();
        require_admin(&state, action)?;
        Ok(self.epoch())
    }

    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    /// Restore a remembered sign-in at startup
    ///
    /// A remembered guest whose name has since been blocked stays signed out.
    ///
    /// # Errors
    /// Only `Stale` when a concurrent sign-in won; lookup failures leave the
    /// controller unauthenticated.
    pub async fn restore_session(&self) -> Result<AuthStatus, PortalError> {
        let current = self.auth_status();
        if current.is_authenticated() {
            return Ok(current);
        }

        let status = match self.sessions.load().await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read persisted session");
                AuthStatus::Unauthenticated
            }
        };

        if let AuthStatus::Guest { name } = &status {
            match self.authenticator.lookup_or_create_guest(name).await {
                Ok(guest) if guest.blocked => {
                    tracing::warn!(guest = %name, "Persisted guest is blocked; not restoring");
                    self.forget_session().await;
                    return Ok(AuthStatus::Unauthenticated);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Guest lookup failed; not restoring");
                    return Ok(AuthStatus::Unauthenticated);
                }
            }
        }

        if !status.is_authenticated() {
            tracing::debug!("No session to restore");
            return Ok(AuthStatus::Unauthenticated);
        }

        self.establish(status.clone()).await?;
        tracing::info!(status = %status, "Session restored");
        Ok(status)
    }

    /// Sign in as admin
    ///
    /// # Errors
    /// `Auth(InvalidCredentials)` for a wrong secret, `InvalidTransition` when
    /// already signed in.
    pub async fn sign_in_admin(&self, secret: &str) -> Result<(), PortalError> {
        validate_transition(&self.auth_status(), &AuthStatus::Admin)?;

        match self.authenticator.verify_admin_credential(secret).await {
            Ok(true) => self.establish(AuthStatus::Admin).await,
            Ok(false) => {
                tracing::warn!("Admin sign-in rejected");
                Err(self.login_failed(AuthError::InvalidCredentials.into()))
            }
            Err(e) => {
                tracing::error!(error = %e, "Admin credential check failed");
                Err(self.login_failed(e.into()))
            }
        }
    }

    /// Sign in as a named guest
    ///
    /// # Errors
    /// `Validation(EmptyName)`, `Auth(Blocked)` for a blocked name,
    /// `InvalidTransition` when already signed in.
    pub async fn sign_in_guest(&self, name: &str) -> Result<(), PortalError> {
        let name = name.trim();
        let target = AuthStatus::Guest {
            name: name.to_string(),
        };
        validate_transition(&self.auth_status(), &target)?;

        if name.is_empty() {
            return Err(self.login_failed(ValidationError::EmptyName.into()));
        }

        match self.authenticator.lookup_or_create_guest(name).await {
            Ok(guest) if guest.blocked => {
                tracing::warn!(guest = %name, "Blocked guest sign-in rejected");
                Err(self.login_failed(
                    AuthError::Blocked {
                        name: name.to_string(),
                    }
                    .into(),
                ))
            }
            Ok(_) => self.establish(target).await,
            Err(e) => {
                tracing::error!(error = %e, "Guest lookup failed");
                Err(self.login_failed(e.into()))
            }
        }
    }

    /// Sign out, dropping every loaded collection
    ///
    /// # Errors
    /// `InvalidTransition` when nobody is signed in.
    pub async fn sign_out(&self) -> Result<(), PortalError> {
        let previous = {
            let mut state = self.state.write();
            validate_transition(&state.auth, &AuthStatus::Unauthenticated)?;
            self.epoch.fetch_add(1, Ordering::AcqRel);
            let previous = state.auth.clone();
            state.reset_session();
            previous
        };
        self.forget_session().await;
        tracing::info!(status = %previous, "Signed out");
        Ok(())
    }

    fn login_failed(&self, err: PortalError) -> PortalError {
        self.state.write().login_error = Some(err.user_message());
        err
    }

    async fn forget_session(&self) {
        if let Err(e) = self.sessions.clear().await {
            tracing::warn!(error = %e, "Failed to clear persisted session");
        }
    }

    async fn establish(&self, status: AuthStatus) -> Result<(), PortalError> {
        let visits = self.sessions.load_visits().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read visit timestamps");
            Default::default()
        });

        let epoch = {
            let mut state = self.state.write();
            validate_transition(&state.auth, &status)?;
            state.reset_session();
            state.auth = status.clone();
            state.view = View::Feed;
            state.seen = SeenTracker::with_visits(visits);
            self.epoch.fetch_add(1, Ordering::AcqRel) + 1
        };
        tracing::info!(status = %status, "Signed in");

        if let Err(e) = self.sessions.save(&status).await {
            tracing::warn!(error = %e, "Failed to persist session");
        }

        match self.load_with_epoch(epoch).await {
            Err(PortalError::Stale) => Err(PortalError::Stale),
            // Failure is recorded in `last_load_error`; the sign-in itself stands
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Data load
    // ------------------------------------------------------------------

    /// Reload all collections
    ///
    /// # Errors
    /// `Unauthorized` when signed out, the first failing read otherwise. On
    /// failure no collection is replaced.
    pub async fn load_data(&self) -> Result<(), PortalError> {
        let epoch = {
            let state = self.state.read();
            require_authenticated(&state, "load data")?;
            self.epoch()
        };
        self.load_with_epoch(epoch).await
    }

    async fn load_with_epoch(&self, epoch: u64) -> Result<(), PortalError> {
        let is_admin = {
            let mut state = self.state.write();
            if !state.auth.is_authenticated() {
                return Err(PortalError::Unauthorized { action: "load data" });
            }
            state.loading = true;
            state.auth.is_admin()
        };
        let started = Instant::now();

        let result = tokio::try_join!(
            async { self.store.list_records::<Article>().await.map_err(PortalError::from) },
            async { self.store.list_records::<Meeting>().await.map_err(PortalError::from) },
            async { self.store.list_records::<MediaAsset>().await.map_err(PortalError::from) },
            async {
                self.store
                    .get_typed_setting::<SocialLinks>(SocialLinks::KEY)
                    .await
                    .map_err(PortalError::from)
            },
            async {
                if is_admin {
                    self.authenticator.list_guests().await.map_err(PortalError::from)
                } else {
                    Ok(Vec::new())
                }
            },
        );

        self.ensure_epoch(epoch)?;
        let mut state = self.state.write();
        state.loading = false;

        match result {
            Ok((mut articles, mut meetings, mut media_assets, social_links, guests)) => {
                Article::sort_newest_first(&mut articles);
                Meeting::sort_newest_first(&mut meetings);
                MediaAsset::sort_newest_first(&mut media_assets);

                state.seen.refresh(&articles, &meetings);
                if let Some(selected) = state.selected_article.as_ref().map(|a| a.id.clone()) {
                    if let Some(fresh) = articles.iter().find(|a| a.id == selected) {
                        state.selected_article = Some(fresh.clone());
                    }
                }

                tracing::debug!(
                    articles = articles.len(),
                    meetings = meetings.len(),
                    media_assets = media_assets.len(),
                    guests = guests.len(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "Loaded portal data"
                );

                state.articles = articles;
                state.meetings = meetings;
                state.media_assets = media_assets;
                state.social_links = social_links.unwrap_or_default();
                state.guests = guests;
                state.loaded = true;
                state.last_load_error = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load portal data");
                state.last_load_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn after_write(
        &self,
        epoch: u64,
        navigate: impl FnOnce(&mut AppState) + Send,
    ) -> Result<(), PortalError> {
        self.ensure_epoch(epoch)?;
        match self.load_with_epoch(epoch).await {
            Err(PortalError::Stale) => return Err(PortalError::Stale),
            // Recorded in `last_load_error`; the write itself succeeded
            Err(_) | Ok(()) => {}
        }

        let mut state = self.state.write();
        if self.epoch() != epoch {
            return Err(PortalError::Stale);
        }
        navigate(&mut *state);
        state.form_error = None;
        Ok(())
    }

    fn finish_form<T>(&self, action: &'static str, result: Result<T, PortalError>) -> Result<T, PortalError> {
        if let Err(e) = &result {
            match e.kind() {
                ErrorKind::Access => {}
                ErrorKind::Persistence => tracing::error!(action, error = %e, "Operation failed"),
                _ => tracing::warn!(action, error = %e, "Operation rejected"),
            }
            if e.kind() != ErrorKind::Access && !matches!(e, PortalError::Stale) {
                self.state.write().form_error = Some(e.user_message());
            }
        }
        result
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Navigate to `view`
    ///
    /// Visiting the feed, meetings or activities clears that section's badge.
    ///
    /// # Errors
    /// `Unauthorized` for admin views as guest or when signed out,
    /// `NoLiveSession` for the live viewer without a stream, `NotFound` for
    /// the detail view without a selected article.
    pub async fn navigate(&self, view: View) -> Result<(), PortalError> {
        let visits = {
            let mut state = self.state.write();
            require_authenticated(&state, "navigate")?;
            if view.requires_admin() {
                require_admin(&state, "open admin view")?;
            }
            match view {
                View::LiveUser if !self.live.is_live() => return Err(PortalError::NoLiveSession),
                View::Detail if state.selected_article.is_none() => {
                    return Err(PortalError::not_found("article", "no selection"));
                }
                View::Feed => {
                    state.selected_article = None;
                    state.editing_article = None;
                }
                View::ManageArticle => state.editing_article = None,
                View::ManageMeeting => {
                    prepare_meeting_editor(&mut *state, None);
                }
                _ => {}
            }
            state.view = view;

            view.section().map(|section| {
                state.seen.mark_visited(section, self.now());
                state.seen.visits().clone()
            })
        };
        tracing::debug!(?view, "Navigated");

        if let Some(visits) = visits {
            if let Err(e) = self.sessions.save_visits(&visits).await {
                tracing::warn!(error = %e, "Failed to store visit timestamp");
            }
        }
        Ok(())
    }

    /// Filter the media kit by category; `None` shows everything
    pub fn set_media_filter(&self, category: Option<MediaAssetCategory>) {
        self.state.write().media_filter = category;
    }

    // ------------------------------------------------------------------
    // Articles
    // ------------------------------------------------------------------

    /// Open an article in the detail view and count the view
    ///
    /// # Errors
    /// `Unauthorized` when signed out, `NotFound` for an unknown id.
    pub async fn select_article(&self, id: &RecordId) -> Result<CounterOutcome, PortalError> {
        {
            let mut state = self.state.write();
            require_authenticated(&state, "open article")?;
            let article = state
                .article(id)
                .cloned()
                .ok_or_else(|| PortalError::not_found("article", id))?;
            state.selected_article = Some(article);
            state.view = View::Detail;
        }
        self.increment_view(id).await
    }

    /// Open the editor for an existing article
    ///
    /// # Errors
    /// `Unauthorized` unless admin, `NotFound` for an unknown id.
    pub fn edit_article(&self, id: &RecordId) -> Result<(), PortalError> {
        let mut state = self.state.write();
        require_admin(&state, "edit article")?;
        let article = state
            .article(id)
            .cloned()
            .ok_or_else(|| PortalError::not_found("article", id))?;
        state.editing_article = Some(article);
        state.view = View::ManageArticle;
        Ok(())
    }

    /// Publish a new article
    ///
    /// # Errors
    /// `Unauthorized`, `Validation` before any store call, `Store` on write
    /// failure (the form stays open with `form_error` set).
    pub async fn create_article(&self, draft: ArticleDraft) -> Result<Article, PortalError> {
        let result = self.create_article_inner(draft).await;
        self.finish_form("create article", result)
    }

    async fn create_article_inner(&self, mut draft: ArticleDraft) -> Result<Article, PortalError> {
        let epoch = self.admin_epoch("create article")?;
        draft.validate()?;
        let input = draft
            .media
            .take()
            .ok_or(ValidationError::IncompleteArticle { missing: vec!["media"] })?;

        let media = self.resolve_media(input).await?;
        let article = draft.into_article(media, self.now());
        if let Err(e) = self.store.create_record(&article).await {
            self.discard_blob(article.featured_media.storage_path.as_deref()).await;
            return Err(e.into());
        }
        tracing::info!(article_id = %article.id, title = %article.title, "Article published");

        self.after_write(epoch, |state| {
            state.view = View::Feed;
            state.selected_article = None;
            state.editing_article = None;
        })
        .await?;
        Ok(article)
    }

    /// Edit an article; counters are kept unless `counters` overrides them.
    ///
    /// A draft without media keeps the stored featured media.
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `NotFound`, `Store`.
    pub async fn update_article(
        &self,
        id: &RecordId,
        draft: ArticleDraft,
        counters: CounterOverride,
    ) -> Result<Article, PortalError> {
        let result = self.update_article_inner(id, draft, counters).await;
        self.finish_form("update article", result)
    }

    async fn update_article_inner(
        &self,
        id: &RecordId,
        mut draft: ArticleDraft,
        counters: CounterOverride,
    ) -> Result<Article, PortalError> {
        let epoch = self.admin_epoch("update article")?;
        if draft.media.is_some() {
            draft.validate()?;
        }

        let existing: Article = self
            .store
            .get_record(id)
            .await?
            .ok_or_else(|| PortalError::not_found("article", id))?;
        let input = match draft.media.take() {
            Some(input) => input,
            None => MediaInput::Linked(existing.featured_media.clone()),
        };
        draft.media = Some(input.clone());
        draft.validate()?;
        draft.media = None;

        let media = self.resolve_media(input).await?;
        let old_blob = existing
            .featured_media
            .storage_path
            .clone()
            .filter(|old| media.storage_path.as_ref() != Some(old));
        let updated = draft.apply_to(&existing, media, counters);

        if let Err(e) = self
            .store
            .update_record_keeping_counters(&updated, &kept_counters(counters))
            .await
        {
            if updated.featured_media.storage_path != existing.featured_media.storage_path {
                self.discard_blob(updated.featured_media.storage_path.as_deref()).await;
            }
            return Err(e.into());
        }
        self.discard_blob(old_blob.as_deref()).await;
        tracing::info!(article_id = %id, "Article updated");

        self.after_write(epoch, |state| {
            state.view = View::Feed;
            state.editing_article = None;
        })
        .await?;

        let state = self.state.read();
        match state.article(id) {
            Some(stored) if state.last_load_error.is_none() => Ok(stored.clone()),
            _ => Ok(updated),
        }
    }

    /// Delete an article; leaves the detail view if it was showing it
    ///
    /// # Errors
    /// `Unauthorized`, `Store`.
    pub async fn delete_article(&self, id: &RecordId) -> Result<(), PortalError> {
        let result = self.delete_article_inner(id).await;
        self.finish_form("delete article", result)
    }

    async fn delete_article_inner(&self, id: &RecordId) -> Result<(), PortalError> {
        let epoch = self.admin_epoch("delete article")?;
        let known = self.state.read().article(id).cloned();
        let existing = match known {
            Some(article) => Some(article),
            None => self.store.get_record::<Article>(id).await?,
        };

        self.store.delete_record::<Article>(id).await?;
        let was_viewing = self.state.read().is_viewing(id);
        if let Some(article) = &existing {
            self.discard_blob(article.featured_media.storage_path.as_deref()).await;
        }
        tracing::info!(article_id = %id, was_viewing, "Article deleted");

        self.after_write(epoch, move |state| {
            if was_viewing {
                state.view = View::Feed;
                state.selected_article = None;
            }
        })
        .await
    }

    /// Count a view optimistically
    ///
    /// # Errors
    /// `Unauthorized` when signed out, `NotFound` for an unknown article.
    /// Store failures are retried, then rolled back and only logged.
    pub async fn increment_view(&self, id: &RecordId) -> Result<CounterOutcome, PortalError> {
        self.bump_counter(id, CounterPath::Views).await
    }

    /// Count an outbound link click for platform key `fb`, `insta` or `x`
    ///
    /// # Errors
    /// `Validation(UnknownPlatform)` before any store call, otherwise as
    /// [`PortalController::increment_view`].
    pub async fn increment_link_click(&self, id: &RecordId, platform: &str) -> Result<CounterOutcome, PortalError> {
        let platform: Platform = platform.parse()?;
        self.bump_counter(id, CounterPath::LinkClick(platform)).await
    }

    async fn bump_counter(&self, id: &RecordId, path: CounterPath) -> Result<CounterOutcome, PortalError> {
        let epoch = {
            let mut state = self.state.write();
            require_authenticated(&state, "count engagement")?;
            let current = state
                .article(id)
                .or_else(|| state.selected_article.as_ref().filter(|a| &a.id == id))
                .map(|a| counter_of(a, path))
                .ok_or_else(|| PortalError::not_found("article", id))?;
            if current == u64::MAX {
                return Err(counter_overflow(path).into());
            }
            state.update_article(id, |a| *counter_mut(a, path) += 1);
            self.epoch()
        };

        let attempts = self.counter_retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self.persist_increment(id, &path).await {
                Ok(value) => {
                    if self.epoch() == epoch {
                        self.state.write().update_article(id, |a| {
                            let counter = counter_mut(a, path);
                            *counter = (*counter).max(value);
                        });
                    }
                    tracing::debug!(article_id = %id, counter = %path, value, "Counter incremented");
                    return Ok(CounterOutcome::Persisted(value));
                }
                Err(e) => {
                    tracing::warn!(article_id = %id, counter = %path, attempt, error = %e, "Counter increment failed");
                    if !e.is_retryable() || self.epoch() != epoch {
                        break;
                    }
                }
            }
        }

        if self.epoch() != epoch {
            return Ok(CounterOutcome::Discarded);
        }
        self.state.write().update_article(id, |a| {
            let counter = counter_mut(a, path);
            *counter = counter.saturating_sub(1);
        });
        tracing::warn!(article_id = %id, counter = %path, "Rolled back optimistic increment");
        Ok(CounterOutcome::RolledBack)
    }

    async fn persist_increment(&self, id: &RecordId, path: &CounterPath) -> Result<u64, StoreError> {
        if self.store.supports_atomic_increment() {
            return self
                .store
                .increment_counter(Collection::Articles, id.as_str(), path)
                .await;
        }

        let mut article: Article = self
            .store
            .get_record(id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: Collection::Articles,
                id: id.to_string(),
            })?;
        let counter = counter_mut(&mut article, *path);
        let value = counter.checked_add(1).ok_or_else(|| counter_overflow(*path))?;
        *counter = value;
        self.store.update_record(&article).await?;
        Ok(value)
    }

    async fn resolve_media(&self, input: MediaInput) -> Result<FeaturedMedia, PortalError> {
        match input {
            MediaInput::Linked(media) => Ok(media),
            MediaInput::Upload(payload) => {
                let file = self.upload_file(ARTICLE_BLOB_PREFIX, payload).await?;
                Ok(FeaturedMedia::from(file))
            }
        }
    }

    async fn upload_file(&self, prefix: &str, payload: FilePayload) -> Result<FileDescriptor, PortalError> {
        let path = blob_path_for(prefix, &payload.name);
        let FilePayload { name, mime_type, bytes } = payload;
        let size = bytes.len();
        let url = self.blobs.upload(&path, bytes).await?;
        tracing::debug!(path = %path, bytes = size, "Uploaded file");
        Ok(FileDescriptor::new(url, name, mime_type).with_storage_path(path))
    }

    async fn discard_blob(&self, path: Option<&str>) {
        if let Some(path) = path {
            if let Err(e) = self.blobs.delete(path).await {
                tracing::warn!(path, error = %e, "Failed to delete blob");
            }
        }
    }

    // ------------------------------------------------------------------
    // Meetings and activities
    // ------------------------------------------------------------------

    /// Open the meeting editor; `None` starts a new entry whose kind follows
    /// the list the editor was opened from
    ///
    /// # Errors
    /// `Unauthorized` unless admin, `NotFound` for an unknown id.
    pub fn open_meeting_editor(&self, id: Option<&RecordId>) -> Result<(), PortalError> {
        let mut state = self.state.write();
        require_admin(&state, "edit meeting")?;
        let meeting = match id {
            Some(id) => Some(
                state
                    .meeting(id)
                    .cloned()
                    .ok_or_else(|| PortalError::not_found("meeting", id))?,
            ),
            None => None,
        };
        prepare_meeting_editor(&mut *state, meeting);
        Ok(())
    }

    /// Leave the meeting editor for the list it was opened from
    ///
    /// # Errors
    /// `Unauthorized` unless admin.
    pub fn cancel_meeting_editor(&self) -> Result<(), PortalError> {
        let mut state = self.state.write();
        require_admin(&state, "edit meeting")?;
        state.editing_meeting = None;
        state.form_error = None;
        state.view = state.meeting_return_path;
        Ok(())
    }

    /// Schedule a meeting or activity
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `Store`.
    pub async fn create_meeting(&self, draft: MeetingDraft) -> Result<Meeting, PortalError> {
        let result = self.create_meeting_inner(draft).await;
        self.finish_form("create meeting", result)
    }

    async fn create_meeting_inner(&self, draft: MeetingDraft) -> Result<Meeting, PortalError> {
        let epoch = self.admin_epoch("create meeting")?;
        let meeting = draft.into_meeting(self.now())?;
        self.store.create_record(&meeting).await?;
        tracing::info!(meeting_id = %meeting.id, kind = %meeting.kind, "Meeting created");

        let kind = meeting.kind;
        self.after_write(epoch, move |state| {
            state.editing_meeting = None;
            state.view = View::for_meeting_kind(kind);
        })
        .await?;
        Ok(meeting)
    }

    /// Edit a meeting; its kind cannot change
    ///
    /// # Errors
    /// `Unauthorized`, `Validation` (including a kind change), `NotFound`, `Store`.
    pub async fn update_meeting(&self, id: &RecordId, draft: MeetingDraft) -> Result<Meeting, PortalError> {
        let result = self.update_meeting_inner(id, draft).await;
        self.finish_form("update meeting", result)
    }

    async fn update_meeting_inner(&self, id: &RecordId, draft: MeetingDraft) -> Result<Meeting, PortalError> {
        let epoch = self.admin_epoch("update meeting")?;
        draft.validate()?;
        let existing: Meeting = self
            .store
            .get_record(id)
            .await?
            .ok_or_else(|| PortalError::not_found("meeting", id))?;
        let updated = draft.apply_to(&existing)?;
        self.store.update_record(&updated).await?;
        tracing::info!(meeting_id = %id, "Meeting updated");

        let kind = updated.kind;
        self.after_write(epoch, move |state| {
            state.editing_meeting = None;
            state.view = View::for_meeting_kind(kind);
        })
        .await?;
        Ok(updated)
    }

    /// Delete a meeting
    ///
    /// # Errors
    /// `Unauthorized`, `Store`.
    pub async fn delete_meeting(&self, id: &RecordId) -> Result<(), PortalError> {
        let result = self.delete_meeting_inner(id).await;
        self.finish_form("delete meeting", result)
    }

    async fn delete_meeting_inner(&self, id: &RecordId) -> Result<(), PortalError> {
        let epoch = self.admin_epoch("delete meeting")?;
        let kind = self.state.read().meeting(id).map(|m| m.kind);
        self.store.delete_record::<Meeting>(id).await?;
        tracing::info!(meeting_id = %id, "Meeting deleted");

        self.after_write(epoch, move |state| {
            if let Some(kind) = kind {
                state.view = View::for_meeting_kind(kind);
            }
            if state.editing_meeting.as_ref().is_some_and(|m| &m.id == id) {
                state.editing_meeting = None;
            }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Media kit
    // ------------------------------------------------------------------

    /// Upload a media-kit file, then write its record
    ///
    /// # Errors
    /// `Unauthorized`, `Validation`, `Store` (blob or record write).
    pub async fn upload_media_asset(&self, draft: MediaAssetDraft) -> Result<MediaAsset, PortalError> {
        let result = self.upload_media_asset_inner(draft).await;
        self.finish_form("upload media asset", result)
    }

    async fn upload_media_asset_inner(&self, mut draft: MediaAssetDraft) -> Result<MediaAsset, PortalError> {
        let epoch = self.admin_epoch("upload media asset")?;
        draft.validate()?;
        let payload = draft
            .file
            .take()
            .ok_or(ValidationError::IncompleteAsset { missing: vec!["file"] })?;

        let file = self.upload_file(MEDIA_KIT_BLOB_PREFIX, payload).await?;
        let asset = draft.into_asset(file, self.now());
        if let Err(e) = self.store.create_record(&asset).await {
            self.discard_blob(asset.file.storage_path.as_deref()).await;
            return Err(e.into());
        }
        tracing::info!(asset_id = %asset.id, category = asset.category.label(), "Media asset uploaded");

        self.after_write(epoch, |state| state.view = View::MediaKit).await?;
        Ok(asset)
    }

    /// Delete a media-kit asset and its stored file
    ///
    /// # Errors
    /// `Unauthorized`, `Store`.
    pub async fn delete_media_asset(&self, id: &RecordId) -> Result<(), PortalError> {
        let result = self.delete_media_asset_inner(id).await;
        self.finish_form("delete media asset", result)
    }

    async fn delete_media_asset_inner(&self, id: &RecordId) -> Result<(), PortalError> {
        let epoch = self.admin_epoch("delete media asset")?;
        let known = self.state.read().media_asset(id).cloned();
        let existing = match known {
            Some(asset) => Some(asset),
            None => self.store.get_record::<MediaAsset>(id).await?,
        };

        self.store.delete_record::<MediaAsset>(id).await?;
        if let Some(asset) = &existing {
            self.discard_blob(asset.file.storage_path.as_deref()).await;
        }
        tracing::info!(asset_id = %id, "Media asset deleted");

        self.after_write(epoch, |state| state.view = View::MediaKit).await
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Save the social-links singleton
    ///
    /// # Errors
    /// `Unauthorized`, `Store`.
    pub async fn save_social_links(&self, links: SocialLinks) -> Result<(), PortalError> {
        let result = self.save_social_links_inner(links).await;
        self.finish_form("save social links", result)
    }

    async fn save_social_links_inner(&self, links: SocialLinks) -> Result<(), PortalError> {
        let epoch = self.admin_epoch("save social links")?;
        let links = links.normalized();
        self.store.put_typed_setting(SocialLinks::KEY, &links).await?;

        let mut state = self.state.write();
        if self.epoch() != epoch {
            return Err(PortalError::Stale);
        }
        state.social_links = links;
        state.view = View::Feed;
        state.selected_article = None;
        state.editing_article = None;
        state.form_error = None;
        tracing::info!("Social links saved");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Live stream
    // ------------------------------------------------------------------

    /// Go live with an empty chat
    ///
    /// # Errors
    /// `Unauthorized` unless admin, `Validation(EmptyStreamTitle)`.
    pub fn start_live_stream(&self, title: &str) -> Result<LiveSession, PortalError> {
        let mut state = self.state.write();
        require_admin(&state, "start live stream")?;
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyStreamTitle.into());
        }
        let session = self.live.start(title, self.now());
        state.view = View::LiveAdmin;
        Ok(session)
    }

    /// End the stream and return to the feed
    ///
    /// # Errors
    /// `Unauthorized` unless admin, `NoLiveSession`.
    pub fn end_live_stream(&self) -> Result<LiveSession, PortalError> {
        let mut state = self.state.write();
        require_admin(&state, "end live stream")?;
        let ended = self.live.end().ok_or(PortalError::NoLiveSession)?;
        state.view = View::Feed;
        state.selected_article = None;
        state.editing_article = None;
        Ok(ended)
    }

    /// Open the live viewer
    ///
    /// # Errors
    /// `Unauthorized` when signed out, `NoLiveSession`.
    pub fn join_live_stream(&self) -> Result<(), PortalError> {
        let mut state = self.state.write();
        require_authenticated(&state, "join live stream")?;
        if !self.live.is_live() {
            return Err(PortalError::NoLiveSession);
        }
        state.view = View::LiveUser;
        Ok(())
    }

    /// Append a chat message authored as "Admin" or the guest's name
    ///
    /// # Errors
    /// `Unauthorized` when signed out, `Validation(EmptyMessage)`, `NoLiveSession`.
    pub fn post_chat_message(&self, text: &str) -> Result<ChatMessage, PortalError> {
        let author = {
            let state = self.state.read();
            require_authenticated(&state, "post chat message")?;
            state.auth.author_label().unwrap_or_default().to_string()
        };
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        self.live
            .post(&author, text, self.now())
            .ok_or(PortalError::NoLiveSession)
    }

    // ------------------------------------------------------------------
    // Guest registry
    // ------------------------------------------------------------------

    /// Block or unblock a guest name
    ///
    /// # Errors
    /// `Unauthorized` unless admin, `Validation(EmptyName)`, `Auth(Unavailable)`.
    pub async fn set_guest_blocked(&self, name: &str, blocked: bool) -> Result<Guest, PortalError> {
        let epoch = self.admin_epoch("manage guests")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let guest = self.authenticator.set_guest_blocked(name, blocked).await?;
        let guests = self.authenticator.list_guests().await;

        let mut state = self.state.write();
        if self.epoch() != epoch {
            return Err(PortalError::Stale);
        }
        match guests {
            Ok(guests) => state.guests = guests,
            Err(e) => tracing::warn!(error = %e, "Failed to refresh guest list"),
        }
        Ok(guest)
    }
}

fn require_authenticated(state: &AppState, action: &'static str) -> Result<(), PortalError> {
    if state.auth.is_authenticated() {
        Ok(())
    } else {
        tracing::warn!(action, "Rejected action while signed out");
        Err(PortalError::Unauthorized { action })
    }
}

fn require_admin(state: &AppState, action: &'static str) -> Result<(), PortalError> {
    if state.auth.is_admin() {
        Ok(())
    } else {
        tracing::warn!(action, status = %state.auth, "Rejected admin action");
        Err(PortalError::Unauthorized { action })
    }
}

fn prepare_meeting_editor(state: &mut AppState, meeting: Option<Meeting>) {
    if state.view.meeting_kind().is_some() {
        state.meeting_return_path = state.view;
    }
    if meeting.is_none() {
        state.new_meeting_kind = state.meeting_return_path.meeting_kind().unwrap_or_default();
    }
    state.editing_meeting = meeting;
    state.view = View::ManageMeeting;
}

/// Counters an update keeps from the stored record
fn kept_counters(overrides: CounterOverride) -> Vec<CounterPath> {
    CounterPath::ARTICLE
        .into_iter()
        .filter(|path| match path {
            CounterPath::Views => overrides.views.is_none(),
            CounterPath::LinkClick(_) => overrides.link_clicks.is_none(),
        })
        .collect()
}

fn counter_overflow(path: CounterPath) -> StoreError {
    StoreError::InvalidCounter {
        path: path.to_string(),
        message: "counter overflow".to_string(),
    }
}

fn counter_of(article: &Article, path: CounterPath) -> u64 {
    match path {
        CounterPath::Views => article.views,
        CounterPath::LinkClick(platform) => article.link_clicks.get(platform),
    }
}

fn counter_mut(article: &mut Article, path: CounterPath) -> &mut u64 {
    match path {
        CounterPath::Views => &mut article.views,
        CounterPath::LinkClick(platform) => article.link_clicks.get_mut(platform),
    }
}
