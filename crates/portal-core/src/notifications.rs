//! "Unseen since last visit" tracking

use chrono::{DateTime, Utc};
use portal_model::{Article, Meeting, MeetingKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Section that carries an unseen badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// News feed
    Feed,
    /// Meetings list
    Meetings,
    /// Activities list
    Activities,
}

impl Section {
    /// All tracked sections
    pub const ALL: [Self; 3] = [Self::Feed, Self::Meetings, Self::Activities];

    /// Section listing meetings of `kind`
    #[must_use]
    pub fn for_meeting_kind(kind: MeetingKind) -> Self {
        match kind {
            MeetingKind::Meeting => Self::Meetings,
            MeetingKind::Activity => Self::Activities,
        }
    }
}

/// Last visit per section
pub type VisitLog = BTreeMap<Section, DateTime<Utc>>;

/// Badge flags derived on each load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnseenBadges {
    /// New articles since the last feed visit
    pub feed: bool,
    /// New meetings since the last meetings visit
    pub meetings: bool,
    /// New activities since the last activities visit
    pub activities: bool,
}

impl UnseenBadges {
    /// Flag for one section
    #[must_use]
    pub fn get(&self, section: Section) -> bool {
        match section {
            Section::Feed => self.feed,
            Section::Meetings => self.meetings,
            Section::Activities => self.activities,
        }
    }

    fn set(&mut self, section: Section, value: bool) {
        match section {
            Section::Feed => self.feed = value,
            Section::Meetings => self.meetings = value,
            Section::Activities => self.activities = value,
        }
    }
}

/// Compares record creation times with stored last-visit timestamps.
///
/// A section without a stored timestamp treats every record as unseen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenTracker {
    visits: VisitLog,
    badges: UnseenBadges,
}

impl SeenTracker {
    /// Tracker seeded with stored timestamps
    #[must_use]
    pub fn with_visits(visits: VisitLog) -> Self {
        Self {
            visits,
            badges: UnseenBadges::default(),
        }
    }

    /// Stored timestamps
    #[must_use]
    pub fn visits(&self) -> &VisitLog {
        &self.visits
    }

    /// Current badges
    #[must_use]
    pub fn badges(&self) -> UnseenBadges {
        self.badges
    }

    /// True if a record created at `created_at` is newer than the last visit
    #[must_use]
    pub fn is_unseen(&self, section: Section, created_at: DateTime<Utc>) -> bool {
        self.visits.get(&section).map_or(true, |last| created_at > *last)
    }

    /// Recompute every badge from freshly loaded records
    pub fn refresh(&mut self, articles: &[Article], meetings: &[Meeting]) {
        self.badges.feed = articles.iter().any(|a| self.is_unseen(Section::Feed, a.created_at));
        for kind in [MeetingKind::Meeting, MeetingKind::Activity] {
            let section = Section::for_meeting_kind(kind);
            let unseen = meetings
                .iter()
                .filter(|m| m.kind == kind)
                .any(|m| self.is_unseen(section, m.created_at));
            self.badges.set(section, unseen);
        }
    }

    /// Record a visit and clear the section's badge
    pub fn mark_visited(&mut self, section: Section, now: DateTime<Utc>) {
        self.visits.insert(section, now);
        self.badges.set(section, false);
    }
}
