//! Error types for the persistence layer

use crate::collection::Collection;

/// Persistence failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Record does not exist
    #[error("{collection} record not found: {id}")]
    NotFound {
        /// Collection searched
        collection: Collection,
        /// Requested id
        id: String,
    },

    /// A record with this id already exists
    #[error("{collection} record already exists: {id}")]
    Duplicate {
        /// Target collection
        collection: Collection,
        /// Conflicting id
        id: String,
    },

    /// Document has no string `id` field
    #[error("{0} document has no id")]
    MissingId(Collection),

    /// Stored document does not match the expected shape
    #[error("failed to decode {collection} document: {message}")]
    Decode {
        /// Collection or setting the document came from
        collection: String,
        /// Decoder message
        message: String,
    },

    /// Counter path points at something that is not a counter
    #[error("invalid counter {path}: {message}")]
    InvalidCounter {
        /// Dotted counter path
        path: String,
        /// What was found instead
        message: String,
    },

    /// Operation not provided by this backend
    #[error("operation not supported by {backend}: {operation}")]
    Unsupported {
        /// Backend name
        backend: &'static str,
        /// Operation name
        operation: &'static str,
    },

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-reported failure (network, connection, constraint...)
    #[error("backend error: {0}")]
    Backend(String),

    /// Blob storage failure
    #[error("blob storage error: {0}")]
    Blob(String),
}

impl StoreError {
    /// Create a decode error
    #[inline]
    pub fn decode(collection: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            collection: collection.to_string(),
            message: err.to_string(),
        }
    }

    /// Check if the error is transient and the call may be retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Backend(_) | Self::Blob(_))
    }

    /// Check if the error is a missing record
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
