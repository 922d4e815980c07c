//! News articles and their engagement counters

use crate::error::ValidationError;
use crate::id::RecordId;
use crate::media::{FeaturedMedia, MediaInput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Article category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ArticleCategory {
    /// State news
    #[default]
    #[serde(rename = "State News")]
    State,
    /// National news
    #[serde(rename = "National News")]
    National,
    /// Local events
    #[serde(rename = "Local Events")]
    LocalEvents,
    /// Government schemes
    #[serde(rename = "Government Schemes")]
    GovernmentSchemes,
    /// Party activities
    #[serde(rename = "Party Activities")]
    PartyActivities,
}

impl ArticleCategory {
    /// Display label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::State => "State News",
            Self::National => "National News",
            Self::LocalEvents => "Local Events",
            Self::GovernmentSchemes => "Government Schemes",
            Self::PartyActivities => "Party Activities",
        }
    }
}

impl FromStr for ArticleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "state" | "state news" => Ok(Self::State),
            "national" | "national news" => Ok(Self::National),
            "local" | "local events" => Ok(Self::LocalEvents),
            "schemes" | "government schemes" => Ok(Self::GovernmentSchemes),
            "party" | "party activities" => Ok(Self::PartyActivities),
            other => Err(format!("unknown article category: {other}")),
        }
    }
}

/// Social platform whose outbound links are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Facebook
    #[serde(rename = "fb")]
    Facebook,
    /// Instagram
    #[serde(rename = "insta")]
    Instagram,
    /// X (Twitter)
    #[serde(rename = "x")]
    X,
}

impl Platform {
    /// All platforms
    pub const ALL: [Self; 3] = [Self::Facebook, Self::Instagram, Self::X];

    /// Stable key used in stored records and counter paths
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Facebook => "fb",
            Self::Instagram => "insta",
            Self::X => "x",
        }
    }
}

impl FromStr for Platform {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fb" => Ok(Self::Facebook),
            "insta" => Ok(Self::Instagram),
            "x" => Ok(Self::X),
            other => Err(ValidationError::UnknownPlatform(other.to_string())),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Per-platform outbound link clicks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkClicks {
    /// Facebook clicks
    #[serde(default)]
    pub fb: u64,
    /// Instagram clicks
    #[serde(default)]
    pub insta: u64,
    /// X clicks
    #[serde(default)]
    pub x: u64,
}

impl LinkClicks {
    /// Count for one platform
    #[must_use]
    pub fn get(&self, platform: Platform) -> u64 {
        match platform {
            Platform::Facebook => self.fb,
            Platform::Instagram => self.insta,
            Platform::X => self.x,
        }
    }

    /// Mutable count for one platform
    pub fn get_mut(&mut self, platform: Platform) -> &mut u64 {
        match platform {
            Platform::Facebook => &mut self.fb,
            Platform::Instagram => &mut self.insta,
            Platform::X => &mut self.x,
        }
    }

    /// Sum over all platforms
    #[must_use]
    pub fn total(&self) -> u64 {
        self.fb + self.insta + self.x
    }
}

/// Optional per-article social post URLs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SocialUrls {
    /// Facebook post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fb: Option<String>,
    /// Instagram post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insta: Option<String>,
    /// X post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
}

impl SocialUrls {
    /// URL for one platform
    #[must_use]
    pub fn get(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Facebook => self.fb.as_deref(),
            Platform::Instagram => self.insta.as_deref(),
            Platform::X => self.x.as_deref(),
        }
    }

    /// Drop blank entries
    #[must_use]
    pub fn normalized(self) -> Self {
        let keep = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            fb: keep(self.fb),
            insta: keep(self.insta),
            x: keep(self.x),
        }
    }
}

/// A published news article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Unique id
    pub id: RecordId,
    /// Headline
    pub title: String,
    /// Body text
    pub body: String,
    /// Category
    pub category: ArticleCategory,
    /// Featured image/video/document
    pub featured_media: FeaturedMedia,
    /// Publish time (primary sort key)
    pub published_at: DateTime<Utc>,
    /// View count
    #[serde(default)]
    pub views: u64,
    /// Outbound link clicks
    #[serde(default)]
    pub link_clicks: LinkClicks,
    /// Optional social post URLs
    #[serde(default)]
    pub socials: SocialUrls,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Sort newest first by publish time
    pub fn sort_newest_first(articles: &mut [Article]) {
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    }
}

/// Explicit counter values applied on update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterOverride {
    /// Replacement view count
    pub views: Option<u64>,
    /// Replacement link clicks
    pub link_clicks: Option<LinkClicks>,
}

/// Article form contents
#[derive(Debug, Clone, Default)]
pub struct ArticleDraft {
    /// Headline
    pub title: String,
    /// Body text
    pub body: String,
    /// Category
    pub category: ArticleCategory,
    /// Featured media (required)
    pub media: Option<MediaInput>,
    /// Social post URLs
    pub socials: SocialUrls,
}

impl ArticleDraft {
    /// Create a draft
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// With category
    #[must_use]
    pub fn with_category(mut self, category: ArticleCategory) -> Self {
        self.category = category;
        self
    }

    /// With featured media
    #[must_use]
    pub fn with_media(mut self, media: MediaInput) -> Self {
        self.media = Some(media);
        self
    }

    /// With social URLs
    #[must_use]
    pub fn with_socials(mut self, socials: SocialUrls) -> Self {
        self.socials = socials;
        self
    }

    /// Check required fields: title, body, media
    ///
    /// # Errors
    /// `ValidationError::IncompleteArticle` naming every missing field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.body.trim().is_empty() {
            missing.push("body");
        }
        let media_ok = match &self.media {
            Some(MediaInput::Linked(m)) => !m.url.trim().is_empty(),
            Some(MediaInput::Upload(p)) => !p.is_empty(),
            None => false,
        };
        if !media_ok {
            missing.push("media");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::IncompleteArticle { missing })
        }
    }

    /// Build a fresh article with zeroed counters
    #[must_use]
    pub fn into_article(self, media: FeaturedMedia, now: DateTime<Utc>) -> Article {
        Article {
            id: RecordId::new(),
            title: self.title.trim().to_string(),
            body: self.body,
            category: self.category,
            featured_media: media,
            published_at: now,
            views: 0,
            link_clicks: LinkClicks::default(),
            socials: self.socials.normalized(),
            created_at: now,
        }
    }

    /// Apply an edit on top of `existing`, keeping id, dates and counters
    /// unless `counters` overrides them
    #[must_use]
    pub fn apply_to(self, existing: &Article, media: FeaturedMedia, counters: CounterOverride) -> Article {
        Article {
            id: existing.id.clone(),
            title: self.title.trim().to_string(),
            body: self.body,
            category: self.category,
            featured_media: media,
            published_at: existing.published_at,
            views: counters.views.unwrap_or(existing.views),
            link_clicks: counters.link_clicks.unwrap_or(existing.link_clicks),
            socials: self.socials.normalized(),
            created_at: existing.created_at,
        }
    }
}
