//! Validation errors for drafts and user input
//!
//! These are raised before any persistence call and are always recoverable:
//! the caller keeps the form contents and shows the message inline.

/// Input validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Article draft lacks title, body or featured media
    #[error("All fields including the featured media file are required to publish a post.")]
    IncompleteArticle {
        /// Names of the missing fields
        missing: Vec<&'static str>,
    },

    /// Meeting draft lacks one of the required fields
    #[error("Title, Date, Location, and Description are required fields.")]
    IncompleteMeeting {
        /// Names of the missing fields
        missing: Vec<&'static str>,
    },

    /// Media asset draft lacks title or file payload
    #[error("Title and a file are required.")]
    IncompleteAsset {
        /// Names of the missing fields
        missing: Vec<&'static str>,
    },

    /// A meeting's type cannot change after creation
    #[error("a {from} cannot be turned into an {to}")]
    MeetingKindChanged {
        /// Stored type
        from: String,
        /// Requested type
        to: String,
    },

    /// Unknown social platform key
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    /// Guest display name is blank
    #[error("Please enter your name to continue.")]
    EmptyName,

    /// Chat message text is blank
    #[error("message cannot be empty")]
    EmptyMessage,

    /// Live stream title is blank
    #[error("stream title is required")]
    EmptyStreamTitle,

    /// Malformed `data:` URL
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),
}

impl ValidationError {
    /// Fields reported missing, if this is a missing-field error
    #[must_use]
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            Self::IncompleteArticle { missing }
            | Self::IncompleteMeeting { missing }
            | Self::IncompleteAsset { missing } => missing,
            _ => &[],
        }
    }
}
