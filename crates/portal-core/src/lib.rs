//! Portal Core
//!
//! The controller behind the content portal:
//! - Authentication state machine (admin, named guests, block-list)
//! - Auth-gated navigation with per-view loading placeholders
//! - Data loading, publishing and editing through a pluggable store
//! - Optimistic view and link-click counters with rollback
//! - Unseen-content badges and an ephemeral live chat
//!
//! # Example
//!
//! ```rust
//! use portal_core::{PortalController, View};
//! use portal_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), portal_core::PortalError> {
//! let portal = PortalController::builder(Arc::new(MemoryStore::new()))
//!     .with_admin_secret("correct horse")
//!     .build()?;
//!
//! portal.sign_in_admin("correct horse").await?;
//! portal.navigate(View::Meetings).await?;
//! assert!(!portal.badges().get(portal_core::Section::Meetings));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod live;
pub mod notifications;
pub mod session;
pub mod state;
pub mod view;

// Re-exports
pub use auth::{validate_transition, AuthStatus, Authenticator, StoreAuthenticator};
pub use config::{BackendKind, ConfigError, PortalConfig};
pub use controller::{Clock, CounterOutcome, PortalController, PortalControllerBuilder};
pub use error::{AuthError, ErrorKind, PortalError};
pub use live::{ChatMessage, LiveHub, LiveNotice, LiveSession};
pub use notifications::{Section, SeenTracker, UnseenBadges, VisitLog};
pub use session::{FileSessionStore, MemorySessionStore, PersistedSession, SessionScope, SessionStore};
pub use state::AppState;
pub use view::{Placeholder, Screen, View};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the portal
    pub use crate::{AuthStatus, CounterOutcome, PortalConfig, PortalController, PortalError, Screen, View};
    pub use portal_model::{
        ArticleCategory, ArticleDraft, CounterOverride, FeaturedMedia, MediaAssetCategory, MediaAssetDraft,
        MediaInput, MeetingDraft, MeetingKind, RecordId, SocialLinks,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
