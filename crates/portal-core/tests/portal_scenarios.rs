//! End-to-end controller scenarios
//!
//! Admin and guest controllers share one store, blob store and live hub
//! through the test harness.

use chrono::Duration;
use portal_core::{AuthError, AuthStatus, CounterOutcome, PortalError, Screen, Section, View};
use portal_model::{
    ArticleDraft, CounterOverride, FeaturedMedia, LinkClicks, MediaAssetCategory, MediaInput, MeetingKind, Platform,
    SocialLinks, ValidationError,
};
use portal_store::{CounterPath, RecordStore};
use portal_test_utils::{article_draft, media_asset_draft, meeting_draft, FailOn, Harness};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn created_article_has_zeroed_counters() {
    let h = Harness::new();
    let admin = h.admin().await;
    admin.navigate(View::ManageArticle).await.unwrap();

    let media = FeaturedMedia::new("data:image/jpeg;base64,/9j/4AAQ", "a.jpg", "image/jpeg");
    let created = admin
        .create_article(ArticleDraft::new("Test", "Hello").with_media(MediaInput::Linked(media)))
        .await
        .unwrap();

    let state = admin.state();
    assert_eq!(state.view, View::Feed);
    assert_eq!(state.articles.len(), 1);
    let article = &state.articles[0];
    assert_eq!(article.id, created.id);
    assert_eq!(article.views, 0);
    assert_eq!(article.link_clicks, LinkClicks::default());
    assert_eq!(article.featured_media.name, "a.jpg");
}

#[tokio::test]
async fn link_click_updates_detail_without_reload() {
    let h = Harness::new();
    let admin = h.admin().await;
    let article = admin.create_article(article_draft("Rally")).await.unwrap();

    assert_eq!(admin.select_article(&article.id).await.unwrap(), CounterOutcome::Persisted(1));
    assert_eq!(admin.view(), View::Detail);

    // Reads would fail; the click must not need one
    h.store.fail_always(FailOn::Reads);
    let outcome = admin.increment_link_click(&article.id, "fb").await.unwrap();
    h.store.heal();
    assert_eq!(outcome, CounterOutcome::Persisted(1));

    let state = admin.state();
    let detail = state.selected_article.as_ref().unwrap();
    assert_eq!(detail.link_clicks.fb, 1);
    assert_eq!(detail.views, 1);
    assert_eq!(state.articles[0].link_clicks.fb, 1);

    let stored: portal_model::Article = h.store.get_record(&article.id).await.unwrap().unwrap();
    assert_eq!(stored.link_clicks.fb, 1);
    assert_eq!(stored.link_clicks.x, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_view_increments_are_not_lost() {
    let h = Harness::new();
    let admin = Arc::new(h.admin().await);
    let guest = Arc::new(h.guest("Asha").await);
    let article = admin.create_article(article_draft("Counted")).await.unwrap();
    guest.load_data().await.unwrap();

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let portal = if i % 2 == 0 { Arc::clone(&admin) } else { Arc::clone(&guest) };
            let id = article.id.clone();
            tokio::spawn(async move { portal.increment_view(&id).await })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        assert!(matches!(result.unwrap().unwrap(), CounterOutcome::Persisted(_)));
    }

    let stored: portal_model::Article = h.store.get_record(&article.id).await.unwrap().unwrap();
    assert_eq!(stored.views, 10);

    admin.load_data().await.unwrap();
    assert_eq!(admin.state().articles[0].views, 10);
}

#[tokio::test]
async fn past_meeting_lands_in_past_partition() {
    let h = Harness::new();
    let admin = h.admin().await;
    let now = h.clock.now();

    admin.navigate(View::Meetings).await.unwrap();
    admin.open_meeting_editor(None).unwrap();
    assert_eq!(admin.state().new_meeting_kind, MeetingKind::Meeting);

    admin
        .create_meeting(meeting_draft("Old review", MeetingKind::Meeting, now - Duration::days(3)))
        .await
        .unwrap();
    admin
        .create_meeting(meeting_draft("Soon", MeetingKind::Meeting, now + Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(admin.view(), View::Meetings);

    let split = admin.meeting_partition(MeetingKind::Meeting);
    assert_eq!(split.past.len(), 1);
    assert_eq!(split.past[0].title, "Old review");
    assert_eq!(split.upcoming.len(), 1);

    // Partition is computed at render time, not at load
    h.clock.advance(Duration::hours(2));
    let split = admin.meeting_partition(MeetingKind::Meeting);
    assert!(split.upcoming.is_empty());
    assert_eq!(split.past.len(), 2);
    assert!(admin.meeting_partition(MeetingKind::Activity).past.is_empty());
}

#[tokio::test]
async fn meeting_saves_navigate_by_kind() {
    let h = Harness::new();
    let admin = h.admin().await;
    let at = h.clock.now() + Duration::days(2);

    admin.navigate(View::Activities).await.unwrap();
    admin.open_meeting_editor(None).unwrap();
    let kind = admin.state().new_meeting_kind;
    let activity = admin.create_meeting(meeting_draft("Cleanup drive", kind, at)).await.unwrap();
    assert_eq!(activity.kind, MeetingKind::Activity);
    assert_eq!(admin.view(), View::Activities);

    admin.open_meeting_editor(Some(&activity.id)).unwrap();
    let err = admin
        .update_meeting(&activity.id, meeting_draft("Cleanup drive", MeetingKind::Meeting, at))
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Validation(ValidationError::MeetingKindChanged { .. })));
    let state = admin.state();
    assert_eq!(state.view, View::ManageMeeting);
    assert!(state.form_error.is_some());

    let updated = admin
        .update_meeting(
            &activity.id,
            meeting_draft("Beach cleanup", MeetingKind::Activity, at).with_link("https://meet.example/x"),
        )
        .await
        .unwrap();
    assert_eq!(updated.id, activity.id);
    assert_eq!(updated.created_at, activity.created_at);
    assert_eq!(admin.view(), View::Activities);
    assert!(admin.state().form_error.is_none());

    admin.navigate(View::Feed).await.unwrap();
    admin.delete_meeting(&activity.id).await.unwrap();
    assert_eq!(admin.view(), View::Activities);
    assert!(admin.state().meetings.is_empty());
}

#[tokio::test]
async fn live_chat_is_shared_without_persistence() {
    let h = Harness::new();
    let admin = h.admin().await;
    let guest = h.guest("Asha").await;

    assert!(guest.live_notice().is_none());
    admin.start_live_stream("Press Briefing").unwrap();
    assert_eq!(admin.view(), View::LiveAdmin);
    assert_eq!(guest.live_notice().unwrap().title, "Press Briefing");

    guest.join_live_stream().unwrap();
    assert_eq!(guest.view(), View::LiveUser);

    h.store.fail_always(FailOn::Writes);
    guest.post_chat_message("hello").unwrap();
    admin.post_chat_message("welcome everyone").unwrap();
    h.store.heal();

    let seen_by_admin = admin.live_session().unwrap().messages;
    let seen_by_guest = guest.live_session().unwrap().messages;
    assert_eq!(seen_by_admin, seen_by_guest);
    assert_eq!(seen_by_admin.len(), 2);
    assert_eq!(seen_by_admin[0].author, "Asha");
    assert_eq!(seen_by_admin[0].text, "hello");
    assert_eq!(seen_by_admin[1].author, "Admin");

    assert!(matches!(
        guest.post_chat_message("   "),
        Err(PortalError::Validation(ValidationError::EmptyMessage))
    ));

    admin.end_live_stream().unwrap();
    assert_eq!(admin.view(), View::Feed);
    assert!(matches!(guest.post_chat_message("bye"), Err(PortalError::NoLiveSession)));
}

#[tokio::test]
async fn sign_out_drops_admin_only_collections() {
    let h = Harness::new();
    let portal = h.admin().await;
    portal.create_article(article_draft("One")).await.unwrap();
    portal.set_guest_blocked("Troll", true).await.unwrap();
    assert_eq!(portal.state().guests.len(), 1);

    portal.sign_out().await.unwrap();
    let state = portal.state();
    assert_eq!(state.auth, AuthStatus::Unauthenticated);
    assert!(state.guests.is_empty());
    assert!(state.articles.is_empty());
    assert!(!state.loaded);
    assert!(matches!(portal.screen(), Screen::SignIn { error: None }));

    portal.sign_in_guest("Asha").await.unwrap();
    let state = portal.state();
    assert!(state.guests.is_empty());
    assert_eq!(state.articles.len(), 1);
    assert!(state.loaded);
}

#[tokio::test]
async fn blocked_guest_gets_specific_message() {
    let h = Harness::new();
    let admin = h.admin().await;
    admin.set_guest_blocked("Troll", true).await.unwrap();

    let portal = h.controller();
    let err = portal.sign_in_guest("troll").await.unwrap_err();
    assert!(matches!(err, PortalError::Auth(AuthError::Blocked { .. })));
    assert_eq!(
        portal.screen(),
        Screen::SignIn {
            error: Some("The name \"troll\" has been blocked by the administrator.".to_string())
        }
    );

    let err = portal.sign_in_admin("wrong").await.unwrap_err();
    assert_ne!(err.user_message(), "The name \"troll\" has been blocked by the administrator.");

    admin.set_guest_blocked("troll", false).await.unwrap();
    portal.sign_in_guest("Troll").await.unwrap();
    assert!(portal.auth_status().is_authenticated());
}

#[tokio::test]
async fn deleting_viewed_article_returns_to_feed() {
    let h = Harness::new();
    let admin = h.admin().await;
    let keep = admin.create_article(article_draft("Keep")).await.unwrap();
    let gone = admin.create_article(article_draft("Gone")).await.unwrap();

    admin.select_article(&keep.id).await.unwrap();
    admin.delete_article(&gone.id).await.unwrap();
    assert_eq!(admin.view(), View::Detail);

    admin.select_article(&keep.id).await.unwrap();
    admin.delete_article(&keep.id).await.unwrap();
    let state = admin.state();
    assert_eq!(state.view, View::Feed);
    assert!(state.selected_article.is_none());
    assert!(state.articles.is_empty());
}

#[tokio::test]
async fn update_keeps_counters_and_refreshes_detail() {
    let h = Harness::new();
    let admin = h.admin().await;
    let article = admin.create_article(article_draft("Draft title")).await.unwrap();
    admin.select_article(&article.id).await.unwrap();
    admin.increment_link_click(&article.id, "x").await.unwrap();

    admin.edit_article(&article.id).unwrap();
    let draft = ArticleDraft::new("Final title", "New body");
    let updated = admin
        .update_article(&article.id, draft, CounterOverride::default())
        .await
        .unwrap();
    assert_eq!(updated.views, 1);
    assert_eq!(updated.link_clicks.x, 1);
    assert_eq!(updated.featured_media, article.featured_media);

    let state = admin.state();
    assert_eq!(state.view, View::Feed);
    assert_eq!(state.selected_article.as_ref().unwrap().title, "Final title");

    let reset = admin
        .update_article(
            &article.id,
            article_draft("Final title"),
            CounterOverride {
                views: Some(0),
                link_clicks: Some(LinkClicks::default()),
            },
        )
        .await
        .unwrap();
    assert_eq!(reset.views, 0);
    assert_eq!(reset.link_clicks.total(), 0);
}

#[tokio::test]
async fn update_keeps_increments_that_land_during_the_edit() {
    let h = Harness::new();
    let admin = h.admin().await;
    let article = admin.create_article(article_draft("Busy")).await.unwrap();
    admin.increment_link_click(&article.id, "fb").await.unwrap();

    h.store.increment_during_next_update(CounterPath::Views);
    let updated = admin
        .update_article(&article.id, ArticleDraft::new("Busy, edited", "Body"), CounterOverride::default())
        .await
        .unwrap();

    let stored: portal_model::Article = h.store.get_record(&article.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Busy, edited");
    assert_eq!(stored.views, 1);
    assert_eq!(stored.link_clicks.fb, 1);
    assert_eq!(updated.views, 1);
    assert_eq!(admin.state().articles[0].views, 1);

    // An explicit override replaces only the counter it names
    h.store.increment_during_next_update(CounterPath::LinkClick(Platform::Facebook));
    admin
        .update_article(
            &article.id,
            ArticleDraft::new("Busy, edited", "Body"),
            CounterOverride {
                views: Some(0),
                link_clicks: None,
            },
        )
        .await
        .unwrap();
    let stored: portal_model::Article = h.store.get_record(&article.id).await.unwrap().unwrap();
    assert_eq!(stored.views, 0);
    assert_eq!(stored.link_clicks.fb, 2);
}

#[tokio::test]
async fn media_kit_upload_and_delete() {
    let h = Harness::new();
    let admin = h.admin().await;
    let asset = admin.upload_media_asset(media_asset_draft("Press kit")).await.unwrap();

    assert_eq!(admin.view(), View::MediaKit);
    assert_eq!(h.blobs.len(), 1);
    assert!(asset.file.url.starts_with("/media/media-kit/"));
    assert_eq!(asset.file.mime_type, "application/pdf");

    admin.set_media_filter(Some(MediaAssetCategory::Logo));
    assert!(admin.filtered_media().is_empty());
    admin.set_media_filter(Some(MediaAssetCategory::Banner));
    assert_eq!(admin.filtered_media().len(), 1);

    admin.delete_media_asset(&asset.id).await.unwrap();
    assert!(h.blobs.is_empty());
    assert!(admin.state().media_assets.is_empty());
}

#[tokio::test]
async fn social_links_are_saved_and_shared() {
    let h = Harness::new();
    let admin = h.admin().await;
    admin.navigate(View::Admin).await.unwrap();

    let links = SocialLinks {
        fb: Some("https://facebook.com/portal".to_string()),
        ..SocialLinks::default()
    };
    admin.save_social_links(links.clone()).await.unwrap();
    assert_eq!(admin.view(), View::Feed);
    assert_eq!(admin.state().social_links.fb, links.fb);

    let guest = h.guest("Asha").await;
    assert_eq!(guest.state().social_links.fb, links.fb);
}

#[tokio::test]
async fn guests_cannot_reach_admin_actions() {
    let h = Harness::new();
    let guest = h.guest("Asha").await;

    for view in [View::ManageArticle, View::Admin, View::LiveAdmin, View::ManageMeeting] {
        assert!(matches!(guest.navigate(view).await, Err(PortalError::Unauthorized { .. })));
    }
    assert!(matches!(
        guest.create_article(article_draft("Nope")).await,
        Err(PortalError::Unauthorized { .. })
    ));
    assert!(matches!(
        guest.set_guest_blocked("x", true).await,
        Err(PortalError::Unauthorized { .. })
    ));
    assert_eq!(guest.view(), View::Feed);
    assert!(guest.state().form_error.is_none());

    guest.navigate(View::MediaKit).await.unwrap();
    assert_eq!(guest.screen(), Screen::Ready(View::MediaKit));
}

#[tokio::test]
async fn unseen_badges_follow_visits() {
    let h = Harness::new();
    let admin = h.admin().await;
    admin.create_article(article_draft("First")).await.unwrap();
    let at = h.clock.now() + Duration::days(1);
    admin
        .create_meeting(meeting_draft("Council", MeetingKind::Meeting, at))
        .await
        .unwrap();

    let guest = h.guest("Asha").await;
    let badges = guest.badges();
    assert!(badges.get(Section::Feed));
    assert!(badges.get(Section::Meetings));
    assert!(!badges.get(Section::Activities));

    guest.navigate(View::Feed).await.unwrap();
    guest.navigate(View::Meetings).await.unwrap();
    assert!(!guest.badges().get(Section::Feed));
    assert!(!guest.badges().get(Section::Meetings));

    h.clock.advance(Duration::minutes(5));
    admin.create_article(article_draft("Second")).await.unwrap();
    guest.load_data().await.unwrap();
    assert!(guest.badges().get(Section::Feed));
    assert!(!guest.badges().get(Section::Meetings));
}
