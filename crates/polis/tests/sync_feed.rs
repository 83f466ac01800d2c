//! Feed aggregation, follow flows, and projection scenarios.

use chrono::Utc;

use polis::AppContext;
use polis_feed::{aggregate, FeedStore};
use polis_follow::FollowStore;
use polis_notify::NotificationStore;
use polis_protocol::events::{EVENT_BLESSING_GRANTED, EVENT_FOLLOW_ANNOUNCED};
use polis_protocol::{BlessingStatus, SitePaths, StreamEvent};
use polis_stream::{
    CheckpointStore, FollowHandler, FollowState, MemoryStreamSource, NotificationHandler,
    NotificationState, Projector, FOLLOW_HANDLER, NOTIFICATION_HANDLER,
};
use polis_test_utils::{MemoryPeers, ScriptedDiscovery, TestSite};

fn event(id: &str, event_type: &str, actor: &str, target: &str) -> StreamEvent {
    StreamEvent {
        id: id.into(),
        timestamp: Utc::now(),
        event_type: event_type.into(),
        actor: actor.into(),
        target: Some(target.into()),
        payload: serde_json::json!({
            "comment_url": "https://bob.polis.pub/comments/20250102/c.md"
        }),
    }
}

#[tokio::test]
async fn test_stale_feed_refresh() {
    let alice = TestSite::new("alice.polis.pub");
    let bob = TestSite::new("bob.polis.pub");
    bob.content
        .publish_post("# One\n\nfirst\n", None, &bob.keys)
        .unwrap();
    bob.content
        .publish_post("# Two\n\nsecond\n", None, &bob.keys)
        .unwrap();

    let peers = MemoryPeers::new();
    peers.serve_site(&bob);

    let follows = FollowStore::new(SitePaths::new(alice.temp.path()));
    let discovery = ScriptedDiscovery::new(BlessingStatus::Pending);
    follows
        .follow(bob.base_url(), &peers, &discovery, &alice.content)
        .await
        .unwrap();

    // Never-refreshed cache reports stale.
    let feed = FeedStore::new(SitePaths::new(alice.temp.path()));
    assert!(feed.counts().stale);

    // Refresh: aggregate + merge.
    let following = follows.list().unwrap();
    let result = aggregate(&following, &peers, &feed.load().unwrap()).await;
    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    let new_items = feed.merge(result.items).unwrap();
    assert_eq!(new_items, 2);

    let counts = feed.counts();
    assert!(!counts.stale);
    assert_eq!(counts.unread, 2);

    // A third post appears; only the diff comes in.
    bob.content
        .publish_post("# Three\n\nthird\n", None, &bob.keys)
        .unwrap();
    peers.serve_site(&bob);
    let result = aggregate(&following, &peers, &feed.load().unwrap()).await;
    let new_items = feed.merge(result.items).unwrap();
    assert_eq!(new_items, 1);
    assert_eq!(feed.counts().total, 3);
}

#[tokio::test]
async fn test_republish_shows_as_new_version_in_feed() {
    let alice = TestSite::new("alice.polis.pub");
    let bob = TestSite::new("bob.polis.pub");
    let post = bob
        .content
        .publish_post("# One\n\nfirst\n", None, &bob.keys)
        .unwrap();

    let peers = MemoryPeers::new();
    peers.serve_site(&bob);

    let follows = FollowStore::new(SitePaths::new(alice.temp.path()));
    let discovery = ScriptedDiscovery::new(BlessingStatus::Pending);
    follows
        .follow(bob.base_url(), &peers, &discovery, &alice.content)
        .await
        .unwrap();
    let following = follows.list().unwrap();

    let feed = FeedStore::new(SitePaths::new(alice.temp.path()));
    let result = aggregate(&following, &peers, &feed.load().unwrap()).await;
    feed.merge(result.items).unwrap();
    assert_eq!(feed.counts().total, 1);

    // Version changes on republish; the item is keyed by url+version.
    bob.content
        .republish_post(&post.path, "# One\n\nrevised\n", &bob.keys)
        .unwrap();
    peers.serve_site(&bob);
    let result = aggregate(&following, &peers, &feed.load().unwrap()).await;
    assert_eq!(feed.merge(result.items).unwrap(), 1);
}

#[tokio::test]
async fn test_follower_projection_replay() {
    let alice = TestSite::new("alice.polis.pub");
    let paths = SitePaths::new(alice.temp.path());
    let checkpoints = CheckpointStore::new(paths, alice.domain());

    let source = MemoryStreamSource::new();
    for (i, peer) in ["bob.polis.pub", "carol.polis.pub", "dave.polis.pub"]
        .iter()
        .enumerate()
    {
        source.push(event(
            &format!("e{i}"),
            EVENT_FOLLOW_ANNOUNCED,
            peer,
            "alice.polis.pub",
        ));
    }

    let handler = FollowHandler::new(alice.domain());
    let projector = Projector::new(&source, &checkpoints);
    projector.run(&handler, false).await.unwrap();
    let before: FollowState = checkpoints.load_state(FOLLOW_HANDLER).unwrap().unwrap();
    assert_eq!(before.count, 3);

    // Delete the stream state and replay from cursor "0": identical result.
    checkpoints.reset(FOLLOW_HANDLER).unwrap();
    projector.run(&handler, false).await.unwrap();
    let after: FollowState = checkpoints.load_state(FOLLOW_HANDLER).unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_blessing_granted_notification() {
    let bob = TestSite::new("bob.polis.pub");
    let paths = SitePaths::new(bob.temp.path());
    let checkpoints = CheckpointStore::new(paths.clone(), bob.domain());

    let source = MemoryStreamSource::new();
    source.push(event(
        "e1",
        EVENT_BLESSING_GRANTED,
        "alice.polis.pub",
        "bob.polis.pub",
    ));

    let handler = NotificationHandler::new(bob.domain(), vec![]);
    let projector = Projector::new(&source, &checkpoints);
    projector.run(&handler, false).await.unwrap();

    let state: NotificationState = checkpoints
        .load_state(NOTIFICATION_HANDLER)
        .unwrap()
        .unwrap();
    let notifications = NotificationStore::new(paths);
    notifications.merge(&state.notifications).unwrap();

    assert_eq!(notifications.count_unread().unwrap(), 1);
    let page = notifications.list_paginated(0, 10, true).unwrap();
    assert_eq!(page.notifications[0].rule_id, "blessing-granted");
    assert!(page.notifications[0].message.contains("alice.polis.pub"));
}
