//! Tests for session registry lookups and lifecycle.

use matchplay_rules::{Mark, MoveOutcome, Phase, RejectReason};
use matchplay_server::{
    ParticipantId, PredictorKind, SessionError, SessionHandle, SessionRegistry, SessionToken,
    VersusOutcome, relock,
};

fn id(name: &str) -> ParticipantId {
    ParticipantId::from(name)
}

#[test]
fn test_join_removes_session_from_token_lookup() {
    let registry = SessionRegistry::new();
    let token = registry.create_session(&id("alice")).expect("Create failed");
    assert!(registry.find_by_token(&token).is_some());

    let snapshot = registry
        .join_session(&token, &id("bob"))
        .expect("Join failed");
    assert_eq!(*snapshot.phase(), Phase::InProgress);
    assert_eq!(snapshot.second(), &Some(id("bob")));

    assert!(registry.find_by_token(&token).is_none());
    for name in ["alice", "bob"] {
        let handle = registry
            .find_by_participant(&id(name))
            .expect("Participant should have a session");
        let SessionHandle::Human(session) = handle else {
            panic!("expected a human session");
        };
        assert_eq!(relock(&session).token(), &token);
    }
}

#[test]
fn test_second_join_is_rejected() {
    let registry = SessionRegistry::new();
    let token = registry.create_session(&id("alice")).expect("Create failed");
    registry
        .join_session(&token, &id("bob"))
        .expect("Join failed");

    let result = registry.join_session(&token, &id("carol"));
    assert_eq!(result, Err(SessionError::Full));
    assert!(registry.find_by_participant(&id("carol")).is_none());
}

#[test]
fn test_unknown_token_not_found() {
    let registry = SessionRegistry::new();
    let result = registry.join_session(&SessionToken::from("12345"), &id("bob"));
    assert_eq!(result, Err(SessionError::NotFound));
}

#[test]
fn test_one_session_per_identity() {
    let registry = SessionRegistry::new();
    let token = registry.create_session(&id("alice")).expect("Create failed");

    assert_eq!(
        registry.create_session(&id("alice")),
        Err(SessionError::AlreadyInSession)
    );
    assert_eq!(
        registry.join_session(&token, &id("alice")),
        Err(SessionError::AlreadyInSession)
    );
    assert_eq!(
        registry.create_automated_session(&id("alice"), PredictorKind::FirstEmpty.build()),
        Err(SessionError::AlreadyInSession)
    );
}

#[test]
fn test_list_joinable_in_opening_order() {
    let registry = SessionRegistry::new();
    let tokens: Vec<SessionToken> = ["alice", "bob", "carol"]
        .iter()
        .map(|name| registry.create_session(&id(name)).expect("Create failed"))
        .collect();

    let unique: std::collections::HashSet<_> = tokens.iter().collect();
    assert_eq!(unique.len(), 3, "Tokens must be unique");

    registry
        .join_session(&tokens[1], &id("dave"))
        .expect("Join failed");

    let joinable = registry.list_joinable();
    let initiators: Vec<&ParticipantId> = joinable.iter().map(|j| j.initiator()).collect();
    assert_eq!(initiators, vec![&id("alice"), &id("carol")]);
    assert_eq!(joinable[0].token(), &tokens[0]);
    assert_eq!(joinable[1].token(), &tokens[2]);
}

#[test]
fn test_automated_session_lookup_and_removal() {
    let registry = SessionRegistry::new();
    registry
        .create_automated_session(&id("erin"), PredictorKind::LineSeeker.build())
        .expect("Create failed");
    assert_eq!(registry.automated_count(), 1);
    assert_eq!(registry.session_count(), 0);

    let handle = registry
        .find_by_participant(&id("erin"))
        .expect("Automated session should be found");
    assert_eq!(handle.phase(), Phase::InProgress);
    let session = handle.as_automated().expect("expected an automated session");
    assert_eq!(relock(session).state().turn(), Mark::First);

    let removed = registry
        .remove_for_participant(&id("erin"))
        .expect("Removal failed");
    assert_eq!(removed.partner_of(&id("erin")), None);
    assert!(registry.find_by_participant(&id("erin")).is_none());
    assert_eq!(registry.automated_count(), 0);
}

#[test]
fn test_remove_for_participant_frees_both_sides() {
    let registry = SessionRegistry::new();
    let token = registry.create_session(&id("alice")).expect("Create failed");
    registry
        .join_session(&token, &id("bob"))
        .expect("Join failed");

    let removed = registry
        .remove_for_participant(&id("bob"))
        .expect("Removal failed");
    assert_eq!(removed.partner_of(&id("bob")), Some(&id("alice")));
    assert!(registry.find_by_participant(&id("alice")).is_none());
    assert_eq!(registry.session_count(), 0);

    // Both are free to start again.
    registry.create_session(&id("alice")).expect("Create failed");
    registry
        .create_automated_session(&id("bob"), PredictorKind::FirstEmpty.build())
        .expect("Create failed");
}

#[test]
fn test_removed_session_refuses_pending_move() {
    let registry = SessionRegistry::new();
    let token = registry.create_session(&id("alice")).expect("Create failed");
    registry
        .join_session(&token, &id("bob"))
        .expect("Join failed");

    // A mover holding the handle loses the session to a forfeit before locking it.
    let Some(SessionHandle::Human(session)) = registry.find_by_participant(&id("alice")) else {
        panic!("expected a human session");
    };
    let removed = registry
        .remove_for_participant(&id("bob"))
        .expect("Removal failed");
    assert_eq!(removed.phase(), Phase::InProgress);

    let outcome = relock(&session).play(&id("alice"), 1, 1);
    assert_eq!(outcome, MoveOutcome::Rejected(RejectReason::NoSession));
    assert_eq!(relock(&session).state().moves_applied(), 0);
    assert!(registry.remove_session(&token).is_none());
}

#[test]
fn test_removed_automated_session_refuses_pending_move() {
    let registry = SessionRegistry::new();
    registry
        .create_automated_session(&id("erin"), PredictorKind::FirstEmpty.build())
        .expect("Create failed");
    let Some(SessionHandle::Automated(session)) = registry.find_by_participant(&id("erin")) else {
        panic!("expected an automated session");
    };

    let removed = registry
        .remove_automated_session(&id("erin"))
        .expect("Removal failed");
    assert_eq!(removed.phase(), Phase::InProgress);
    assert_eq!(
        relock(&session).play(0, 0),
        VersusOutcome::Rejected(RejectReason::NoSession)
    );
    assert_eq!(relock(&session).state().moves_applied(), 0);
}
