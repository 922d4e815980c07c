//! Authentication state machine and the authentication collaborator

use crate::error::{AuthError, PortalError};
use async_trait::async_trait;
use chrono::Utc;
use portal_model::{Guest, RecordId};
use portal_store::{PortalStore, RecordStore, StoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Who is signed in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AuthStatus {
    /// Nobody
    #[default]
    Unauthenticated,
    /// The privileged role
    Admin,
    /// Named read-only participant
    Guest {
        /// Display name
        name: String,
    },
}

impl AuthStatus {
    /// Signed in with any role
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }

    /// Signed in as admin
    #[inline]
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Author label for chat messages: "Admin" or the guest's name
    #[must_use]
    pub fn author_label(&self) -> Option<&str> {
        match self {
            Self::Unauthenticated => None,
            Self::Admin => Some("Admin"),
            Self::Guest { name } => Some(name),
        }
    }

    /// State name used in logs and errors
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Admin => "admin",
            Self::Guest { .. } => "guest",
        }
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Guest { name } => write!(f, "guest ({name})"),
            other => f.write_str(other.state_name()),
        }
    }
}

/// Check a transition of the auth state machine.
///
/// Valid: `unauthenticated -> admin`, `unauthenticated -> guest`,
/// `{admin, guest} -> unauthenticated`. Everything else is rejected.
///
/// # Errors
/// `PortalError::InvalidTransition` naming both states.
pub fn validate_transition(from: &AuthStatus, to: &AuthStatus) -> Result<(), PortalError> {
    let allowed = matches!(
        (from, to),
        (AuthStatus::Unauthenticated, AuthStatus::Admin | AuthStatus::Guest { .. })
            | (AuthStatus::Admin | AuthStatus::Guest { .. }, AuthStatus::Unauthenticated)
    );
    if allowed {
        Ok(())
    } else {
        Err(PortalError::InvalidTransition {
            from: from.state_name().to_string(),
            to: to.state_name().to_string(),
        })
    }
}

/// Credential check and guest registry
#[async_trait]
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    /// True iff `secret` is the admin credential
    async fn verify_admin_credential(&self, secret: &str) -> Result<bool, AuthError>;

    /// Find the guest entry for `name`, creating an unblocked one on first use
    async fn lookup_or_create_guest(&self, name: &str) -> Result<Guest, AuthError>;

    /// All known guests
    async fn list_guests(&self) -> Result<Vec<Guest>, AuthError>;

    /// Set the blocked flag of `name`, creating the entry if needed
    async fn set_guest_blocked(&self, name: &str, blocked: bool) -> Result<Guest, AuthError>;
}

/// Authenticator comparing against a configured secret and keeping guests in the store
#[derive(Debug)]
pub struct StoreAuthenticator {
    store: Arc<dyn PortalStore>,
    admin_digest: [u8; 32],
}

impl StoreAuthenticator {
    /// Create with the admin secret; only its digest is kept
    #[must_use]
    pub fn new(store: Arc<dyn PortalStore>, admin_secret: &str) -> Self {
        Self {
            store,
            admin_digest: digest(admin_secret),
        }
    }

    /// Hex fingerprint of the configured secret, for logs
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.admin_digest[..4])
    }

    async fn find(&self, id: &RecordId) -> Result<Option<Guest>, StoreError> {
        self.store.get_record::<Guest>(id).await
    }
}

fn digest(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

#[async_trait]
impl Authenticator for StoreAuthenticator {
    async fn verify_admin_credential(&self, secret: &str) -> Result<bool, AuthError> {
        let submitted = digest(secret);
        let diff = submitted
            .iter()
            .zip(self.admin_digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        Ok(diff == 0)
    }

    async fn lookup_or_create_guest(&self, name: &str) -> Result<Guest, AuthError> {
        let key = Guest::key_for(name);
        if let Some(guest) = self.find(&key).await? {
            return Ok(guest);
        }

        let guest = Guest::new(name, Utc::now());
        match self.store.create_record(&guest).await {
            Ok(()) => {
                tracing::info!(guest = %guest.name, "Registered guest");
                Ok(guest)
            }
            // Another sign-in registered the same name first
            Err(StoreError::Duplicate { .. }) => self
                .find(&key)
                .await?
                .ok_or_else(|| AuthError::Unavailable(format!("guest {key} vanished"))),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_guests(&self) -> Result<Vec<Guest>, AuthError> {
        let mut guests: Vec<Guest> = self.store.list_records().await?;
        guests.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(guests)
    }

    async fn set_guest_blocked(&self, name: &str, blocked: bool) -> Result<Guest, AuthError> {
        let mut guest = self.lookup_or_create_guest(name).await?;
        if guest.blocked != blocked {
            guest.blocked = blocked;
            self.store.update_record(&guest).await?;
            tracing::info!(guest = %guest.name, blocked, "Updated guest block flag");
        }
        Ok(guest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_store::MemoryStore;

    fn guest(name: &str) -> AuthStatus {
        AuthStatus::Guest {
            name: name.to_string(),
        }
    }

    #[test]
    fn only_documented_transitions_are_valid() {
        let unauth = AuthStatus::Unauthenticated;
        assert!(validate_transition(&unauth, &AuthStatus::Admin).is_ok());
        assert!(validate_transition(&unauth, &guest("a")).is_ok());
        assert!(validate_transition(&AuthStatus::Admin, &unauth).is_ok());
        assert!(validate_transition(&guest("a"), &unauth).is_ok());

        assert!(validate_transition(&unauth, &unauth).is_err());
        assert!(validate_transition(&AuthStatus::Admin, &guest("a")).is_err());
        assert!(validate_transition(&guest("a"), &AuthStatus::Admin).is_err());
        assert!(validate_transition(&guest("a"), &guest("b")).is_err());
    }

    #[test]
    fn author_labels() {
        assert_eq!(AuthStatus::Admin.author_label(), Some("Admin"));
        assert_eq!(guest("Meera").author_label(), Some("Meera"));
        assert_eq!(AuthStatus::Unauthenticated.author_label(), None);
    }

    #[tokio::test]
    async fn admin_secret_check() {
        let auth = StoreAuthenticator::new(Arc::new(MemoryStore::new()), "open sesame");
        assert!(auth.verify_admin_credential("open sesame").await.unwrap());
        assert!(!auth.verify_admin_credential("open sesame ").await.unwrap());
        assert!(!auth.verify_admin_credential("").await.unwrap());
        assert_eq!(auth.fingerprint().len(), 8);
    }

    #[test]
    fn fingerprint_identifies_secret_without_revealing_it() {
        let store: Arc<dyn PortalStore> = Arc::new(MemoryStore::new());
        let a = StoreAuthenticator::new(Arc::clone(&store), "open sesame");
        let again = StoreAuthenticator::new(Arc::clone(&store), "open sesame");
        let b = StoreAuthenticator::new(store, "close sesame");

        assert_eq!(a.fingerprint(), again.fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn guests_are_registered_once_and_blockable() {
        let auth = StoreAuthenticator::new(Arc::new(MemoryStore::new()), "x");

        let first = auth.lookup_or_create_guest("Anil Kumar").await.unwrap();
        let again = auth.lookup_or_create_guest("  anil   KUMAR ").await.unwrap();
        assert_eq!(first, again);
        assert!(!first.blocked);

        let blocked = auth.set_guest_blocked("anil kumar", true).await.unwrap();
        assert!(blocked.blocked);
        assert!(auth.lookup_or_create_guest("Anil Kumar").await.unwrap().blocked);

        auth.set_guest_blocked("Someone Else", true).await.unwrap();
        assert_eq!(auth.list_guests().await.unwrap().len(), 2);
    }
}
