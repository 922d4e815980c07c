//! Portal Model
//!
//! Domain records shared by the store backends and the portal controller:
//! - **Article**: news posts with view and per-platform link-click counters
//! - **Meeting**: meetings and activities, partitioned into upcoming and past
//! - **MediaAsset**: downloadable media-kit files
//! - **SocialLinks**: the singleton social-profile setting
//! - **Guest**: named guest entries carrying the block flag
//!
//! Everything here is plain data plus validation. No I/O happens in this crate.
//!
//! # Example
//!
//! ```rust
//! use portal_model::{ArticleCategory, ArticleDraft, FeaturedMedia, MediaInput};
//!
//! let draft = ArticleDraft::new("Test", "Hello")
//!     .with_category(ArticleCategory::State)
//!     .with_media(MediaInput::Linked(FeaturedMedia::new(
//!         "https://cdn.example.org/a.jpg",
//!         "a.jpg",
//!         "image/jpeg",
//!     )));
//!
//! assert!(draft.validate().is_ok());
//! ```

#![warn(missing_docs)]

pub mod article;
pub mod error;
pub mod guest;
pub mod id;
pub mod media;
pub mod meeting;
pub mod settings;

// Re-exports
pub use article::{Article, ArticleCategory, ArticleDraft, CounterOverride, LinkClicks, Platform, SocialUrls};
pub use error::ValidationError;
pub use guest::Guest;
pub use id::RecordId;
pub use media::{
    FeaturedMedia, FileDescriptor, FilePayload, MediaAsset, MediaAssetCategory, MediaAssetDraft,
    MediaInput, MediaKind,
};
pub use meeting::{parse_invited, Meeting, MeetingDraft, MeetingKind, MeetingPartition};
pub use settings::SocialLinks;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
