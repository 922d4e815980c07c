//! Application state owned by the controller

use crate::auth::AuthStatus;
use crate::notifications::{SeenTracker, UnseenBadges};
use crate::view::{Screen, View};
use chrono::{DateTime, Utc};
use portal_model::{
    Article, Guest, MediaAsset, MediaAssetCategory, Meeting, MeetingKind, MeetingPartition, RecordId,
    SocialLinks,
};

/// Everything the view layer renders from
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Who is signed in
    pub auth: AuthStatus,
    /// Current navigation target
    pub view: View,
    /// At least one data load completed for this session
    pub loaded: bool,
    /// A load is in flight
    pub loading: bool,
    /// Articles, newest first
    pub articles: Vec<Article>,
    /// Meetings and activities, newest first
    pub meetings: Vec<Meeting>,
    /// Media kit, newest first
    pub media_assets: Vec<MediaAsset>,
    /// Social profile links
    pub social_links: SocialLinks,
    /// Guest registry; admin sessions only
    pub guests: Vec<Guest>,
    /// Article open in the detail view
    pub selected_article: Option<Article>,
    /// Article open in the editor; `None` means a new article
    pub editing_article: Option<Article>,
    /// Meeting open in the editor; `None` means a new meeting
    pub editing_meeting: Option<Meeting>,
    /// List the meeting editor returns to
    pub meeting_return_path: View,
    /// Kind given to a new meeting
    pub new_meeting_kind: MeetingKind,
    /// Media kit category filter
    pub media_filter: Option<MediaAssetCategory>,
    /// Sign-in form error
    pub login_error: Option<String>,
    /// Inline error of the last failed form submission
    pub form_error: Option<String>,
    /// Message of the last failed data load
    pub last_load_error: Option<String>,
    /// Unseen badge tracking
    pub seen: SeenTracker,
}

impl AppState {
    /// Fresh state with the meeting editor defaulting to the meetings list
    #[must_use]
    pub fn new() -> Self {
        Self {
            meeting_return_path: View::Meetings,
            ..Self::default()
        }
    }

    /// What to render
    #[must_use]
    pub fn screen(&self) -> Screen {
        if !self.auth.is_authenticated() {
            return Screen::SignIn {
                error: self.login_error.clone(),
            };
        }
        if self.loaded {
            Screen::Ready(self.view)
        } else {
            Screen::Loading(self.view.placeholder())
        }
    }

    /// Current badges
    #[must_use]
    pub fn badges(&self) -> UnseenBadges {
        self.seen.badges()
    }

    /// Article by id from the loaded list
    #[must_use]
    pub fn article(&self, id: &RecordId) -> Option<&Article> {
        self.articles.iter().find(|a| &a.id == id)
    }

    /// Meeting by id from the loaded list
    #[must_use]
    pub fn meeting(&self, id: &RecordId) -> Option<&Meeting> {
        self.meetings.iter().find(|m| &m.id == id)
    }

    /// Media asset by id from the loaded list
    #[must_use]
    pub fn media_asset(&self, id: &RecordId) -> Option<&MediaAsset> {
        self.media_assets.iter().find(|a| &a.id == id)
    }

    /// Upcoming and past entries of one kind relative to `now`
    #[must_use]
    pub fn meeting_partition(&self, kind: MeetingKind, now: DateTime<Utc>) -> MeetingPartition {
        MeetingPartition::of(&self.meetings, kind, now)
    }

    /// Media assets passing the category filter
    #[must_use]
    pub fn filtered_media(&self) -> Vec<&MediaAsset> {
        MediaAsset::filter_by_category(&self.media_assets, self.media_filter)
    }

    /// True if `id` is open in the detail view
    #[must_use]
    pub fn is_viewing(&self, id: &RecordId) -> bool {
        self.view == View::Detail && self.selected_article.as_ref().is_some_and(|a| &a.id == id)
    }

    /// Apply `f` to the listed article and the open detail copy
    pub(crate) fn update_article(&mut self, id: &RecordId, f: impl Fn(&mut Article)) {
        if let Some(a) = self.articles.iter_mut().find(|a| &a.id == id) {
            f(a);
        }
        if let Some(a) = self.selected_article.as_mut().filter(|a| &a.id == id) {
            f(a);
        }
    }

    /// Drop everything tied to the signed-in session
    pub(crate) fn reset_session(&mut self) {
        let seen = std::mem::take(&mut self.seen);
        *self = Self::new();
        self.seen = seen;
    }
}
