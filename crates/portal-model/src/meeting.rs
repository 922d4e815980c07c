//! Meetings and activities calendar

use crate::error::ValidationError;
use crate::id::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Whether a calendar entry is a meeting or a public activity.
/// Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MeetingKind {
    /// Internal meeting
    #[default]
    Meeting,
    /// Public activity
    Activity,
}

impl MeetingKind {
    /// Display label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Meeting => "Meeting",
            Self::Activity => "Activity",
        }
    }

    /// Plural list title
    #[must_use]
    pub fn list_title(self) -> &'static str {
        match self {
            Self::Meeting => "Meetings",
            Self::Activity => "Activities",
        }
    }
}

impl std::fmt::Display for MeetingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A scheduled meeting or activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    /// Unique id
    pub id: RecordId,
    /// Title
    pub title: String,
    /// Meeting or activity
    #[serde(rename = "type")]
    pub kind: MeetingKind,
    /// Scheduled date and time
    pub starts_at: DateTime<Utc>,
    /// Venue or "Online"
    pub location: String,
    /// Description
    pub description: String,
    /// Optional join/view link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Invited groups or people
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invited: Vec<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Meeting {
    /// Sort newest first by scheduled date
    pub fn sort_newest_first(meetings: &mut [Meeting]) {
        meetings.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
    }

    /// True if scheduled at or after `now`
    #[inline]
    #[must_use]
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.starts_at >= now
    }

    /// Plain-text summary suitable for messaging apps
    #[must_use]
    pub fn share_text(&self) -> String {
        let mut text = format!("*{}: {}*\n\n", self.kind, self.title);
        let _ = writeln!(text, "*Date:* {}", self.starts_at.format("%B %-d, %Y"));
        let _ = writeln!(text, "*Time:* {}", self.starts_at.format("%I:%M %p"));
        let _ = writeln!(text, "*Location:* {}\n", self.location);
        let _ = write!(text, "*Details:*\n{}\n\n", self.description);
        if let Some(link) = &self.link {
            let _ = write!(text, "*Join/View Link:*\n{link}");
        }
        text
    }
}

/// Meetings of one kind split around the current time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingPartition {
    /// Scheduled at or after now, soonest first
    pub upcoming: Vec<Meeting>,
    /// Scheduled before now, most recent first
    pub past: Vec<Meeting>,
}

impl MeetingPartition {
    /// Partition the entries of `kind` by comparing their date to `now`
    #[must_use]
    pub fn of(meetings: &[Meeting], kind: MeetingKind, now: DateTime<Utc>) -> Self {
        let (mut upcoming, mut past): (Vec<_>, Vec<_>) = meetings
            .iter()
            .filter(|m| m.kind == kind)
            .cloned()
            .partition(|m| m.is_upcoming(now));

        upcoming.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        past.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));

        Self { upcoming, past }
    }
}

/// Meeting form contents
#[derive(Debug, Clone, Default)]
pub struct MeetingDraft {
    /// Title
    pub title: String,
    /// Meeting or activity
    pub kind: MeetingKind,
    /// Scheduled time
    pub starts_at: Option<DateTime<Utc>>,
    /// Venue
    pub location: String,
    /// Description
    pub description: String,
    /// Optional join link
    pub link: Option<String>,
    /// Invited entries
    pub invited: Vec<String>,
}

impl MeetingDraft {
    /// Create a draft of the given kind
    #[must_use]
    pub fn new(title: impl Into<String>, kind: MeetingKind) -> Self {
        Self {
            title: title.into(),
            kind,
            ..Self::default()
        }
    }

    /// With scheduled time
    #[must_use]
    pub fn at(mut self, starts_at: DateTime<Utc>) -> Self {
        self.starts_at = Some(starts_at);
        self
    }

    /// With location
    #[must_use]
    pub fn located(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// With description
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With join link
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// With invited list given one entry per line
    #[must_use]
    pub fn with_invited_text(mut self, text: &str) -> Self {
        self.invited = parse_invited(text);
        self
    }

    /// Check required fields
    ///
    /// # Errors
    /// `ValidationError::IncompleteMeeting` naming every missing field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.starts_at.is_none() {
            missing.push("date");
        }
        if self.location.trim().is_empty() {
            missing.push("location");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::IncompleteMeeting { missing })
        }
    }

    /// Build a new record
    ///
    /// # Errors
    /// Same as [`MeetingDraft::validate`].
    pub fn into_meeting(self, now: DateTime<Utc>) -> Result<Meeting, ValidationError> {
        self.build(RecordId::new(), now)
    }

    /// Apply an edit to `existing`; the kind must not change
    ///
    /// # Errors
    /// Missing fields, or `ValidationError::MeetingKindChanged`.
    pub fn apply_to(self, existing: &Meeting) -> Result<Meeting, ValidationError> {
        if self.kind != existing.kind {
            return Err(ValidationError::MeetingKindChanged {
                from: existing.kind.label().to_string(),
                to: self.kind.label().to_string(),
            });
        }
        self.build(existing.id.clone(), existing.created_at)
    }

    fn build(self, id: RecordId, created_at: DateTime<Utc>) -> Result<Meeting, ValidationError> {
        self.validate()?;
        let starts_at = self
            .starts_at
            .ok_or(ValidationError::IncompleteMeeting { missing: vec!["date"] })?;

        Ok(Meeting {
            id,
            title: self.title.trim().to_string(),
            kind: self.kind,
            starts_at,
            location: self.location.trim().to_string(),
            description: self.description,
            link: self.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
            invited: self.invited,
            created_at,
        })
    }
}

/// Split a one-per-line invited list, trimming and dropping blank lines
#[must_use]
pub fn parse_invited(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect()
}
