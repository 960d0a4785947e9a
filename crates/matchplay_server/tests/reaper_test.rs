//! Tests for idle eviction.

use matchplay_server::{
    IdleReaper, MIN_SWEEP_INTERVAL, MemoryScoreStore, Message, ParticipantId, PredictorKind, PresenceTracker,
    SessionRegistry, Status,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const THRESHOLD: Duration = Duration::from_secs(60);
const EPSILON: Duration = Duration::from_millis(1);

fn id(name: &str) -> ParticipantId {
    ParticipantId::from(name)
}

fn setup() -> (PresenceTracker, SessionRegistry) {
    let tracker = PresenceTracker::new(Arc::new(MemoryScoreStore::new()));
    (tracker, SessionRegistry::new())
}

#[tokio::test(start_paused = true)]
async fn test_present_before_threshold_absent_after() {
    let (tracker, registry) = setup();
    let reaper = IdleReaper::new(tracker.clone(), registry, THRESHOLD);
    let alice = id("alice");

    tracker.touch(&alice).await.expect("Touch failed");
    let seen = tracker.last_activity(&alice).expect("Alice is tracked");

    assert!(reaper.sweep(seen + THRESHOLD - EPSILON).is_empty());
    assert_eq!(tracker.status(&alice), Some(Status::Idle));

    let reaped = reaper.sweep(seen + THRESHOLD + EPSILON);
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].participant, alice);
    assert_eq!(tracker.status(&alice), None);
}

#[tokio::test(start_paused = true)]
async fn test_reaping_mid_session_frees_partner() {
    let (tracker, registry) = setup();
    let (notice_tx, mut notice_rx) = mpsc::channel(8);
    let reaper =
        IdleReaper::new(tracker.clone(), registry.clone(), THRESHOLD).with_notices(notice_tx);
    let (alice, bob) = (id("alice"), id("bob"));

    tracker.touch(&alice).await.expect("Touch failed");
    tracker.touch(&bob).await.expect("Touch failed");
    let token = registry.create_session(&alice).expect("Create failed");
    registry.join_session(&token, &bob).expect("Join failed");
    tracker.set_status(&alice, Status::InSession);
    tracker.set_status(&bob, Status::InSession);
    let start = tracker.last_activity(&alice).expect("Alice is tracked");

    tokio::time::advance(Duration::from_secs(30)).await;
    tracker.touch(&bob).await.expect("Touch failed");

    let reaped = reaper.sweep(start + THRESHOLD + EPSILON);
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].participant, alice);
    assert!(reaped[0].session.is_some());

    assert!(registry.find_by_participant(&alice).is_none());
    assert!(registry.find_by_participant(&bob).is_none());
    assert_eq!(tracker.status(&bob), Some(Status::Idle));

    let notice = notice_rx.try_recv().expect("Partner should be notified");
    assert_eq!(notice.recipient(), &bob);
    assert_eq!(notice.message(), &Message::OpponentTimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_reaping_removes_automated_session() {
    let (tracker, registry) = setup();
    let reaper = IdleReaper::new(tracker.clone(), registry.clone(), THRESHOLD);
    let erin = id("erin");

    tracker.touch(&erin).await.expect("Touch failed");
    registry
        .create_automated_session(&erin, PredictorKind::FirstEmpty.build())
        .expect("Create failed");
    let seen = tracker.last_activity(&erin).expect("Erin is tracked");

    reaper.sweep(seen + THRESHOLD + EPSILON);
    assert!(registry.find_by_participant(&erin).is_none());
    assert_eq!(registry.automated_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_full_notice_channel_does_not_block_sweep() {
    let (tracker, registry) = setup();
    let (notice_tx, _notice_rx) = mpsc::channel(1);
    let reaper =
        IdleReaper::new(tracker.clone(), registry.clone(), THRESHOLD).with_notices(notice_tx);

    for (host, guest) in [("a", "b"), ("c", "d")] {
        tracker.touch(&id(host)).await.expect("Touch failed");
        let token = registry.create_session(&id(host)).expect("Create failed");
        registry.join_session(&token, &id(guest)).expect("Join failed");
    }
    let seen = tracker.last_activity(&id("a")).expect("Host is tracked");

    let reaped = reaper.sweep(seen + THRESHOLD + EPSILON);
    assert_eq!(reaped.len(), 2);
    assert_eq!(registry.session_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_spawned_reaper_evicts_on_interval() {
    let (tracker, registry) = setup();
    let shutdown = CancellationToken::new();
    let handle = IdleReaper::new(tracker.clone(), registry, THRESHOLD)
        .with_interval(Duration::from_secs(10))
        .spawn(shutdown.clone());
    let alice = id("alice");

    tracker.touch(&alice).await.expect("Touch failed");
    tokio::time::sleep(Duration::from_secs(55)).await;
    assert_eq!(tracker.status(&alice), Some(Status::Idle));

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(tracker.status(&alice), None);

    shutdown.cancel();
    handle.await.expect("Reaper task panicked");
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_is_clamped() {
    let (tracker, registry) = setup();
    let reaper = IdleReaper::new(tracker.clone(), registry.clone(), Duration::ZERO);
    assert_eq!(reaper.interval(), MIN_SWEEP_INTERVAL);

    let reaper = IdleReaper::new(tracker.clone(), registry, THRESHOLD).with_interval(Duration::ZERO);
    assert_eq!(reaper.interval(), MIN_SWEEP_INTERVAL);

    let shutdown = CancellationToken::new();
    let handle = reaper.spawn(shutdown.clone());
    tracker.touch(&id("alice")).await.expect("Touch failed");
    tokio::time::sleep(THRESHOLD + Duration::from_secs(1)).await;
    assert_eq!(tracker.status(&id("alice")), None);

    shutdown.cancel();
    handle.await.expect("Reaper task panicked");
}
