//! Error types for the portal controller
//!
//! Every failure falls into one of the taxonomy buckets in [`ErrorKind`]:
//! - validation (form input, recoverable inline)
//! - persistence (backend failure, retryable)
//! - authentication (bad credential or blocked guest)
//! - access (action not allowed in the current auth state)

use crate::config::ConfigError;
use portal_model::ValidationError;
use portal_store::StoreError;

/// Authentication failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Credential rejected; never says whether the account exists
    #[error("Invalid credentials. Please try again.")]
    InvalidCredentials,

    /// Guest name is on the block-list
    #[error("The name \"{name}\" has been blocked by the administrator.")]
    Blocked {
        /// Name as submitted
        name: String,
    },

    /// Authentication collaborator could not be reached
    #[error("authentication unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Coarse classification of a [`PortalError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing input
    Validation,
    /// Backend failure
    Persistence,
    /// Credential or block-list rejection
    Authentication,
    /// Action not permitted in the current state
    Access,
    /// Anything else
    Internal,
}

/// Main controller error type
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Invalid input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Persistence failure
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    /// Authentication failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Action needs a role the session does not have
    #[error("not permitted: {action}")]
    Unauthorized {
        /// Attempted action
        action: &'static str,
    },

    /// Target record is not known
    #[error("{what} not found: {id}")]
    NotFound {
        /// Kind of record
        what: &'static str,
        /// Requested id
        id: String,
    },

    /// Live-stream action without a running stream
    #[error("no live stream is running")]
    NoLiveSession,

    /// Auth state machine rejected the transition
    #[error("invalid auth transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// Configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session changed while the operation was in flight; its completion was discarded
    #[error("session changed before the operation completed")]
    Stale,
}

impl PortalError {
    /// Create a not-found error
    #[inline]
    pub fn not_found(what: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }

    /// Taxonomy bucket
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Persistence,
            Self::Auth(AuthError::Unavailable(_)) => ErrorKind::Persistence,
            Self::Auth(_) => ErrorKind::Authentication,
            Self::Unauthorized { .. } | Self::InvalidTransition { .. } => ErrorKind::Access,
            Self::NotFound { .. } | Self::NoLiveSession | Self::Config(_) | Self::Stale => ErrorKind::Internal,
        }
    }

    /// Check if the user can simply retry the same action
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Auth(AuthError::Unavailable(_)) => true,
            _ => false,
        }
    }

    /// Message suitable for showing next to the form that triggered the error
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Auth(AuthError::Unavailable(_)) => "Sign-in is unavailable right now. Please try again.".to_string(),
            Self::Auth(e) => e.to_string(),
            Self::Store(_) => "Could not save your changes. Please try again.".to_string(),
            Self::Unauthorized { .. } => "You do not have permission to do that.".to_string(),
            Self::NotFound { .. } => "That item no longer exists.".to_string(),
            Self::NoLiveSession => "No live stream is running.".to_string(),
            Self::InvalidTransition { .. } | Self::Stale => "Your session changed. Please try again.".to_string(),
            Self::Config(e) => e.to_string(),
        }
    }
}
