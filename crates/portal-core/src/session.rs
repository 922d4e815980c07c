//! Session persistence
//!
//! The sign-in status survives according to a [`SessionScope`]:
//! - `tab`: held in memory by the running controller only
//! - `browser`: written to a file and restored on the next start
//! - `durable-token`: written with a random token and an expiry; ignored once expired
//!
//! Per-section last-visit timestamps are stored alongside and are kept across
//! sign-outs.

use crate::auth::AuthStatus;
use crate::notifications::VisitLog;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use portal_store::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SESSION_FILE: &str = "session.json";
const VISITS_FILE: &str = "visits.json";

/// How long a sign-in is remembered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionScope {
    /// Only while this controller lives
    #[default]
    Tab,
    /// Until explicit sign-out
    Browser,
    /// Until sign-out or token expiry
    DurableToken,
}

impl FromStr for SessionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tab" => Ok(Self::Tab),
            "browser" => Ok(Self::Browser),
            "durable-token" | "durable" => Ok(Self::DurableToken),
            other => Err(format!("expected tab, browser or durable-token, got {other}")),
        }
    }
}

impl std::fmt::Display for SessionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Tab => "tab",
            Self::Browser => "browser",
            Self::DurableToken => "durable-token",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoredRole {
    Admin,
    Guest,
}

/// On-disk form of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    role: StoredRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl PersistedSession {
    /// Capture an authenticated status; `None` for `Unauthenticated`
    #[must_use]
    pub fn capture(status: &AuthStatus) -> Option<Self> {
        let (role, name) = match status {
            AuthStatus::Unauthenticated => return None,
            AuthStatus::Admin => (StoredRole::Admin, None),
            AuthStatus::Guest { name } => (StoredRole::Guest, Some(name.clone())),
        };
        Some(Self {
            role,
            name,
            token: None,
            expires_at: None,
        })
    }

    /// Attach a fresh token expiring after `ttl`
    #[must_use]
    pub fn with_token(mut self, ttl: Duration, now: DateTime<Utc>) -> Self {
        self.token = Some(uuid::Uuid::new_v4().simple().to_string());
        self.expires_at = Some(now + ttl);
        self
    }

    /// Session token, if one was issued
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// True once the token expiry has passed
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Status to restore. A guest without a stored name restores as unauthenticated.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        match self.role {
            StoredRole::Admin => AuthStatus::Admin,
            StoredRole::Guest => match self.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => AuthStatus::Guest {
                    name: name.to_string(),
                },
                _ => AuthStatus::Unauthenticated,
            },
        }
    }
}

/// Persists the sign-in status and section visit timestamps
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Scope this store implements
    fn scope(&self) -> SessionScope;

    /// Status remembered from an earlier sign-in
    async fn load(&self) -> Result<AuthStatus, StoreError>;

    /// Remember an authenticated status
    async fn save(&self, status: &AuthStatus) -> Result<(), StoreError>;

    /// Forget the status
    async fn clear(&self) -> Result<(), StoreError>;

    /// Stored last-visit timestamps
    async fn load_visits(&self) -> Result<VisitLog, StoreError>;

    /// Store last-visit timestamps
    async fn save_visits(&self, visits: &VisitLog) -> Result<(), StoreError>;
}

/// In-memory session store (`tab` scope)
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<PersistedSession>>,
    visits: Mutex<VisitLog>,
}

impl MemorySessionStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn scope(&self) -> SessionScope {
        SessionScope::Tab
    }

    async fn load(&self) -> Result<AuthStatus, StoreError> {
        Ok(self
            .session
            .lock()
            .as_ref()
            .map_or(AuthStatus::Unauthenticated, PersistedSession::status))
    }

    async fn save(&self, status: &AuthStatus) -> Result<(), StoreError> {
        *self.session.lock() = PersistedSession::capture(status);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.session.lock() = None;
        Ok(())
    }

    async fn load_visits(&self) -> Result<VisitLog, StoreError> {
        Ok(self.visits.lock().clone())
    }

    async fn save_visits(&self, visits: &VisitLog) -> Result<(), StoreError> {
        self.visits.lock().clone_from(visits);
        Ok(())
    }
}

/// File-backed session store (`browser` and `durable-token` scopes)
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
    scope: SessionScope,
    ttl: Duration,
}

impl FileSessionStore {
    /// Create a store writing under `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, scope: SessionScope) -> Self {
        Self {
            dir: dir.into(),
            scope,
            ttl: Duration::days(7),
        }
    }

    /// With token lifetime (durable-token scope only)
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Read the raw persisted session, dropping it when expired
    ///
    /// # Errors
    /// I/O or decode failures.
    pub async fn read_session(&self) -> Result<Option<PersistedSession>, StoreError> {
        let path = self.dir.join(SESSION_FILE);
        let Some(raw) = read_optional(&path).await? else {
            return Ok(None);
        };
        let session: PersistedSession =
            serde_json::from_str(&raw).map_err(|e| StoreError::decode("session", e))?;

        if session.is_expired(Utc::now()) {
            tracing::info!(path = %path.display(), "Session token expired");
            remove_optional(&path).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn write_json(&self, file: &str, raw: String) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_optional(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn scope(&self) -> SessionScope {
        self.scope
    }

    async fn load(&self) -> Result<AuthStatus, StoreError> {
        Ok(self
            .read_session()
            .await?
            .map_or(AuthStatus::Unauthenticated, |s| s.status()))
    }

    async fn save(&self, status: &AuthStatus) -> Result<(), StoreError> {
        let Some(mut session) = PersistedSession::capture(status) else {
            return self.clear().await;
        };
        if self.scope == SessionScope::DurableToken {
            session = session.with_token(self.ttl, Utc::now());
        }
        let raw = serde_json::to_string_pretty(&session).map_err(|e| StoreError::decode("session", e))?;
        self.write_json(SESSION_FILE, raw).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        remove_optional(&self.dir.join(SESSION_FILE)).await
    }

    async fn load_visits(&self) -> Result<VisitLog, StoreError> {
        match read_optional(&self.dir.join(VISITS_FILE)).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::decode("visits", e)),
            None => Ok(VisitLog::default()),
        }
    }

    async fn save_visits(&self, visits: &VisitLog) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(visits).map_err(|e| StoreError::decode("visits", e))?;
        self.write_json(VISITS_FILE, raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::Section;

    fn guest(name: &str) -> AuthStatus {
        AuthStatus::Guest {
            name: name.to_string(),
        }
    }

    #[test]
    fn scope_parses() {
        assert_eq!("durable-token".parse::<SessionScope>().unwrap(), SessionScope::DurableToken);
        assert_eq!("Browser".parse::<SessionScope>().unwrap(), SessionScope::Browser);
        assert!("cookie".parse::<SessionScope>().is_err());
    }

    #[test]
    fn guest_without_name_restores_unauthenticated() {
        let session: PersistedSession = serde_json::from_str(r#"{"role":"guest"}"#).unwrap();
        assert_eq!(session.status(), AuthStatus::Unauthenticated);

        let session: PersistedSession = serde_json::from_str(r#"{"role":"guest","name":"  "}"#).unwrap();
        assert_eq!(session.status(), AuthStatus::Unauthenticated);

        let session: PersistedSession = serde_json::from_str(r#"{"role":"admin"}"#).unwrap();
        assert_eq!(session.status(), AuthStatus::Admin);
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load().await.unwrap(), AuthStatus::Unauthenticated);

        store.save(&guest("Asha")).await.unwrap();
        assert_eq!(store.load().await.unwrap(), guest("Asha"));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn browser_scope_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        FileSessionStore::new(dir.path(), SessionScope::Browser)
            .save(&AuthStatus::Admin)
            .await
            .unwrap();

        let reopened = FileSessionStore::new(dir.path(), SessionScope::Browser);
        assert_eq!(reopened.load().await.unwrap(), AuthStatus::Admin);
        assert!(reopened.read_session().await.unwrap().unwrap().token().is_none());
    }

    #[tokio::test]
    async fn durable_token_expires() {
        let dir = tempfile::tempdir().unwrap();
        let live = FileSessionStore::new(dir.path(), SessionScope::DurableToken);
        live.save(&guest("Ravi")).await.unwrap();
        assert!(live.read_session().await.unwrap().unwrap().token().is_some());
        assert_eq!(live.load().await.unwrap(), guest("Ravi"));

        let expired = FileSessionStore::new(dir.path(), SessionScope::DurableToken).with_ttl(Duration::seconds(-1));
        expired.save(&guest("Ravi")).await.unwrap();
        assert_eq!(expired.load().await.unwrap(), AuthStatus::Unauthenticated);
        assert!(!dir.path().join(SESSION_FILE).exists());
    }

    #[tokio::test]
    async fn visits_persist_across_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path(), SessionScope::Browser);
        let mut visits = VisitLog::default();
        let now = Utc::now();
        visits.insert(Section::Feed, now);

        store.save_visits(&visits).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load_visits().await.unwrap().get(&Section::Feed), Some(&now));
    }
}
