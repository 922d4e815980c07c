//! Screens, navigation targets and loading placeholders

use crate::notifications::Section;
use portal_model::MeetingKind;
use serde::{Deserialize, Serialize};

/// Navigation target once signed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    /// Article list (default screen)
    #[default]
    Feed,
    /// One article
    Detail,
    /// Article editor
    ManageArticle,
    /// Social links settings
    Admin,
    /// Live stream console
    LiveAdmin,
    /// Live stream viewer and chat
    LiveUser,
    /// Meetings list
    Meetings,
    /// Activities list
    Activities,
    /// Meeting editor
    ManageMeeting,
    /// Media kit
    MediaKit,
}

impl View {
    /// Only the admin may open this view
    #[must_use]
    pub fn requires_admin(self) -> bool {
        matches!(self, Self::ManageArticle | Self::Admin | Self::LiveAdmin | Self::ManageMeeting)
    }

    /// Section whose badge a visit clears
    #[must_use]
    pub fn section(self) -> Option<Section> {
        match self {
            Self::Feed => Some(Section::Feed),
            Self::Meetings => Some(Section::Meetings),
            Self::Activities => Some(Section::Activities),
            _ => None,
        }
    }

    /// List view for a meeting kind
    #[must_use]
    pub fn for_meeting_kind(kind: MeetingKind) -> Self {
        match kind {
            MeetingKind::Meeting => Self::Meetings,
            MeetingKind::Activity => Self::Activities,
        }
    }

    /// Meeting kind shown by this list view
    #[must_use]
    pub fn meeting_kind(self) -> Option<MeetingKind> {
        match self {
            Self::Meetings => Some(MeetingKind::Meeting),
            Self::Activities => Some(MeetingKind::Activity),
            _ => None,
        }
    }

    /// Placeholder to show while data for this view is loading
    #[must_use]
    pub fn placeholder(self) -> Placeholder {
        match self {
            Self::Feed => Placeholder::NewsCards { count: 6 },
            Self::Meetings | Self::Activities => Placeholder::MeetingSections {
                title: if self == Self::Meetings { "Meetings" } else { "Activities" },
                upcoming: 2,
                past: 1,
            },
            Self::MediaKit => Placeholder::MediaAssetCards { count: 8 },
            _ => Placeholder::Spinner,
        }
    }
}

/// Skeleton content keyed to the destination view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Grid of article card skeletons
    NewsCards {
        /// Number of cards
        count: usize,
    },
    /// Upcoming and past sections of meeting card skeletons
    MeetingSections {
        /// Page title
        title: &'static str,
        /// Cards under "Upcoming"
        upcoming: usize,
        /// Cards under "Past"
        past: usize,
    },
    /// Grid of media asset card skeletons
    MediaAssetCards {
        /// Number of cards
        count: usize,
    },
    /// Generic spinner
    Spinner,
}

/// What the view layer should render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Sign-in form with an optional form-level error
    SignIn {
        /// Message from the last failed attempt
        error: Option<String>,
    },
    /// Data not loaded yet
    Loading(Placeholder),
    /// Data-backed view
    Ready(View),
}
