//! Tests for concurrent access to shared sessions.

use matchplay_rules::{MoveOutcome, RejectReason};
use matchplay_server::{ParticipantId, SessionHandle, SessionRegistry, relock};
use std::sync::{Arc, Barrier};
use std::thread;

fn id(name: &str) -> ParticipantId {
    ParticipantId::from(name)
}

#[test]
fn test_concurrent_moves_accept_exactly_one() {
    for _ in 0..50 {
        let registry = SessionRegistry::new();
        let token = registry.create_session(&id("alice")).expect("Create failed");
        registry
            .join_session(&token, &id("bob"))
            .expect("Join failed");

        // Alice holds the turn and sends two moves to different empty cells at once.
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [(0, 0), (2, 2)]
            .into_iter()
            .map(|(row, col)| {
                let registry = registry.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let Some(SessionHandle::Human(session)) =
                        registry.find_by_participant(&id("alice"))
                    else {
                        panic!("session missing");
                    };
                    barrier.wait();
                    relock(&session).play(&id("alice"), row, col)
                })
            })
            .collect();

        let outcomes: Vec<MoveOutcome> = handles
            .into_iter()
            .map(|h| h.join().expect("Thread panicked"))
            .collect();

        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        assert_eq!(accepted, 1, "Exactly one move must win the race: {outcomes:?}");
        let refused: Vec<_> = outcomes.iter().filter(|o| !o.is_accepted()).collect();
        assert_eq!(refused, vec![&MoveOutcome::Rejected(RejectReason::OutOfTurn)]);

        let Some(SessionHandle::Human(session)) = registry.find_by_participant(&id("bob")) else {
            panic!("session missing");
        };
        let session = relock(&session);
        assert_eq!(session.state().moves_applied(), 1);
        assert_eq!(session.current_turn_identity(), Ok(&id("bob")));
    }
}

#[test]
fn test_concurrent_joins_admit_one_participant() {
    let registry = SessionRegistry::new();
    let token = registry.create_session(&id("host")).expect("Create failed");
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let registry = registry.clone();
            let token = token.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.join_session(&token, &id(&format!("guest{n}")))
            })
        })
        .collect();

    let joined = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .filter(Result::is_ok)
        .count();
    assert_eq!(joined, 1);
    assert!(registry.list_joinable().is_empty());
}

#[test]
fn test_concurrent_creates_issue_unique_tokens() {
    let registry = SessionRegistry::new();
    let handles: Vec<_> = (0..16)
        .map(|n| {
            let registry = registry.clone();
            thread::spawn(move || registry.create_session(&id(&format!("p{n}"))))
        })
        .collect();

    let mut tokens: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked").expect("Create failed"))
        .collect();
    tokens.sort();
    tokens.dedup();
    assert_eq!(tokens.len(), 16);
    assert_eq!(registry.session_count(), 16);
}
