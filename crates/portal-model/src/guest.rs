//! Guest registry entries

use crate::id::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named guest known to the portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    /// Normalized name, used as key
    pub id: RecordId,
    /// Name as first entered
    pub name: String,
    /// Blocked by the admin
    #[serde(default)]
    pub blocked: bool,
    /// First sign-in
    pub created_at: DateTime<Utc>,
}

impl Guest {
    /// Create an unblocked entry
    #[must_use]
    pub fn new(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Self::key_for(name),
            name: name.trim().to_string(),
            blocked: false,
            created_at: now,
        }
    }

    /// Registry key for a display name: trimmed, inner whitespace collapsed, lowercase
    #[must_use]
    pub fn key_for(name: &str) -> RecordId {
        let key = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        RecordId(key)
    }
}
