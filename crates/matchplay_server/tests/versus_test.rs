//! Tests for games against the automated opponent.

use matchplay_rules::{Board, Cell, Coord, Mark, Phase, RejectReason};
use matchplay_server::{
    AutomatedOpponentSession, FirstEmpty, ParticipantId, SharedPredictor, VersusOutcome,
    VersusResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn at(row: usize, col: usize) -> Coord {
    Coord::new(row, col).expect("valid coordinate")
}

/// FirstEmpty wrapped with a call counter.
fn counting() -> (Arc<AtomicUsize>, SharedPredictor) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let predictor: SharedPredictor = Arc::new(move |board: &Board, mark: Mark| {
        counter.fetch_add(1, Ordering::SeqCst);
        matchplay_server::MovePredictor::select_move(&FirstEmpty, board, mark)
    });
    (calls, predictor)
}

#[test]
fn test_session_starts_in_progress() {
    let session = AutomatedOpponentSession::open(ParticipantId::from("alice"), Arc::new(FirstEmpty));
    assert_eq!(session.state().phase(), Phase::InProgress);
    assert_eq!(session.state().turn(), Mark::First);
    assert_eq!(session.state().moves_applied(), 0);
}

#[test]
fn test_one_reply_per_continuing_move() {
    let (calls, predictor) = counting();
    let mut session = AutomatedOpponentSession::open(ParticipantId::from("alice"), predictor);

    let outcome = session.play(1, 1);
    let VersusOutcome::Accepted {
        board,
        result,
        opponent_move,
    } = outcome
    else {
        panic!("move should be accepted");
    };
    assert_eq!(result, VersusResult::Continue);
    assert_eq!(opponent_move, Some(at(0, 0)));
    assert_eq!(board.get(at(0, 0)), Cell::Occupied(Mark::Second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.state().turn(), Mark::First);
}

#[test]
fn test_winning_move_skips_predictor() {
    let (calls, predictor) = counting();
    let mut session = AutomatedOpponentSession::open(ParticipantId::from("alice"), predictor);

    // Opponent takes (0,0) then (0,1); human completes the anti-diagonal.
    session.play(1, 1);
    session.play(0, 2);
    let outcome = session.play(2, 0);

    assert_eq!(outcome.result(), Some(VersusResult::Win));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.state().phase(), Phase::Finished);
}

#[test]
fn test_rejected_move_skips_predictor() {
    let (calls, predictor) = counting();
    let mut session = AutomatedOpponentSession::open(ParticipantId::from("alice"), predictor);

    assert_eq!(
        session.play(3, 0),
        VersusOutcome::Rejected(RejectReason::InvalidMove)
    );
    session.play(1, 1);
    // (0,0) now belongs to the opponent.
    assert_eq!(
        session.play(0, 0),
        VersusOutcome::Rejected(RejectReason::InvalidMove)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.state().moves_applied(), 2);
}

#[test]
fn test_opponent_can_win() {
    let mut session = AutomatedOpponentSession::open(ParticipantId::from("alice"), Arc::new(FirstEmpty));

    // Opponent fills row 0 while the human plays elsewhere.
    assert_eq!(session.play(1, 0).result(), Some(VersusResult::Continue));
    assert_eq!(session.play(1, 1).result(), Some(VersusResult::Continue));
    assert_eq!(session.play(2, 2).result(), Some(VersusResult::OpponentWin));
    assert_eq!(session.state().phase(), Phase::Finished);
}

#[test]
fn test_occupied_prediction_falls_back_to_first_empty() {
    let predictor: SharedPredictor = Arc::new(|_: &Board, _: Mark| at(1, 1));
    let mut session = AutomatedOpponentSession::open(ParticipantId::from("alice"), predictor);

    let first = session.play(0, 0);
    let VersusOutcome::Accepted { opponent_move, .. } = first else {
        panic!("move should be accepted");
    };
    assert_eq!(opponent_move, Some(at(1, 1)));

    // The predictor insists on the centre, now taken.
    let second = session.play(2, 2);
    let VersusOutcome::Accepted { opponent_move, board, .. } = second else {
        panic!("move should be accepted");
    };
    assert_eq!(opponent_move, Some(at(0, 1)));
    assert_eq!(board.count(Mark::Second), 2);
    assert_eq!(board.count(Mark::First), 2);
}
