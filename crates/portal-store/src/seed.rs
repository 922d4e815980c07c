//! Starter content for an empty store

use crate::error::StoreError;
use crate::record::RecordStore;
use crate::store::PortalStore;
use chrono::{DateTime, Duration, Utc};
use portal_model::{
    Article, ArticleCategory, FeaturedMedia, LinkClicks, Meeting, MeetingKind, RecordId, SocialLinks,
    SocialUrls,
};

/// What `seed_if_empty` wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Articles inserted
    pub articles: usize,
    /// Meetings and activities inserted
    pub meetings: usize,
    /// Whether social links were written
    pub social_links: bool,
}

impl SeedReport {
    /// True when nothing was written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.articles == 0 && self.meetings == 0 && !self.social_links
    }
}

/// Starter articles, newest first, relative to `now`
#[must_use]
pub fn starter_articles(now: DateTime<Utc>) -> Vec<Article> {
    let article = |id: &str, title: &str, body: &str, category, age_days: i64, views, clicks| {
        let published_at = now - Duration::days(age_days);
        Article {
            id: RecordId::from(id),
            title: title.to_string(),
            body: body.to_string(),
            category,
            featured_media: FeaturedMedia::new(
                format!("https://picsum.photos/seed/{id}/800/600"),
                format!("{id}.jpg"),
                "image/jpeg",
            ),
            published_at,
            views,
            link_clicks: clicks,
            socials: SocialUrls::default(),
            created_at: published_at,
        }
    };

    vec![
        article(
            "welcome",
            "Welcome to the portal",
            "News, meetings and media for members, all in one place.\nSign in as a guest to follow along.",
            ArticleCategory::PartyActivities,
            0,
            0,
            LinkClicks::default(),
        ),
        article(
            "projects",
            "New development projects inaugurated",
            "Several infrastructure projects were opened today.\nThey include a flyover and a water treatment plant.",
            ArticleCategory::State,
            1,
            1543,
            LinkClicks { fb: 12, insta: 5, x: 9 },
        ),
        article(
            "cleanliness",
            "Cleanliness drive draws large turnout",
            "Volunteers cleaned public spaces, riversides and markets.",
            ArticleCategory::LocalEvents,
            2,
            876,
            LinkClicks::default(),
        ),
    ]
}

/// Starter meetings and activities around `now`
#[must_use]
pub fn starter_meetings(now: DateTime<Utc>) -> Vec<Meeting> {
    let meeting = |id: &str, title: &str, kind, offset_days: i64, location: &str, description: &str| Meeting {
        id: RecordId::from(id),
        title: title.to_string(),
        kind,
        starts_at: now + Duration::days(offset_days),
        location: location.to_string(),
        description: description.to_string(),
        link: None,
        invited: Vec::new(),
        created_at: now,
    };

    let mut review = meeting(
        "district-review",
        "District review meeting",
        MeetingKind::Meeting,
        5,
        "District Office",
        "Monthly review for district office bearers.",
    );
    review.link = Some("https://meet.example.org/district-review".to_string());
    review.invited = vec!["District office bearers".to_string()];

    let mut camp = meeting(
        "blood-donation",
        "Blood donation camp",
        MeetingKind::Activity,
        12,
        "Community Hall",
        "Open to all. Organised by the youth wing.",
    );
    camp.invited = vec!["Youth wing members".to_string(), "General public".to_string()];

    let executive = meeting(
        "state-executive",
        "State executive meeting",
        MeetingKind::Meeting,
        -10,
        "Online",
        "Quarterly planning session.",
    );

    vec![review, camp, executive]
}

/// Starter social profile links
#[must_use]
pub fn starter_social_links() -> SocialLinks {
    SocialLinks {
        fb: Some("https://www.facebook.com/".to_string()),
        insta: Some("https://www.instagram.com/".to_string()),
        x: Some("https://x.com/".to_string()),
    }
}

/// Write starter content into every empty part of the store.
///
/// Collections that already hold records and an existing social-links setting
/// are left untouched, so running this twice is harmless.
///
/// # Errors
/// Any store failure; records written before the failure stay written.
pub async fn seed_if_empty<S: PortalStore + ?Sized>(store: &S, now: DateTime<Utc>) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();

    if store.list_records::<Article>().await?.is_empty() {
        for article in starter_articles(now) {
            store.create_record(&article).await?;
            report.articles += 1;
        }
    }

    if store.list_records::<Meeting>().await?.is_empty() {
        for meeting in starter_meetings(now) {
            store.create_record(&meeting).await?;
            report.meetings += 1;
        }
    }

    if store.get_setting(SocialLinks::KEY).await?.is_none() {
        store.put_typed_setting(SocialLinks::KEY, &starter_social_links()).await?;
        report.social_links = true;
    }

    tracing::info!(
        backend = store.backend_name(),
        articles = report.articles,
        meetings = report.meetings,
        social_links = report.social_links,
        "Seed complete"
    );

    Ok(report)
}
