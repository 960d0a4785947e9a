//! Tests for the game state machine.

use matchplay_rules::{
    Cell, Coord, GameResult, GameState, Mark, MoveOutcome, Phase, RejectReason, check_all,
};

fn active_game() -> GameState {
    let mut game = GameState::create();
    game.activate().expect("fresh game activates");
    game
}

/// Plays `moves` alternately starting with First, returning the last outcome.
fn play(game: &mut GameState, moves: &[(usize, usize)]) -> MoveOutcome {
    let mut outcome = MoveOutcome::Rejected(RejectReason::NoSession);
    for (row, col) in moves {
        let mark = game.turn();
        outcome = game.apply_move(mark, *row, *col);
        assert!(outcome.is_accepted(), "move ({row}, {col}) should be accepted");
    }
    outcome
}

#[test]
fn test_create_awaits_second_player() {
    let game = GameState::create();
    assert_eq!(game.phase(), Phase::AwaitingSecondPlayer);
    assert_eq!(game.turn(), Mark::First);
    assert_eq!(game.board().filled(), 0);
}

#[test]
fn test_move_before_activation_is_no_session() {
    let mut game = GameState::create();
    assert_eq!(
        game.apply_move(Mark::First, 0, 0),
        MoveOutcome::Rejected(RejectReason::NoSession)
    );
}

#[test]
fn test_activate_twice_is_not_joinable() {
    let mut game = active_game();
    let err = game.activate().expect_err("second activation must fail");
    assert_eq!(err.phase, Phase::InProgress);
}

#[test]
fn test_turn_alternates_and_marks_stay_balanced() {
    let mut game = active_game();
    let sequence = [(1, 1), (0, 0), (2, 2), (0, 2), (0, 1), (2, 1), (1, 0), (1, 2)];

    for (i, (row, col)) in sequence.iter().enumerate() {
        let mover = game.turn();
        let outcome = game.apply_move(mover, *row, *col);
        assert_eq!(outcome.result(), Some(GameResult::Continue));
        assert_eq!(game.turn(), mover.opponent());

        let total = i + 1;
        let ceiling = total.div_ceil(2);
        assert!(game.board().count(Mark::First) <= ceiling);
        assert!(game.board().count(Mark::Second) <= ceiling);
        assert!(check_all(&game).is_ok());
    }
}

#[test]
fn test_wrong_mark_is_out_of_turn() {
    let mut game = active_game();
    assert_eq!(
        game.apply_move(Mark::Second, 0, 0),
        MoveOutcome::Rejected(RejectReason::OutOfTurn)
    );
    assert_eq!(game.moves_applied(), 0);
}

#[test]
fn test_out_of_range_is_invalid_move() {
    let mut game = active_game();
    assert_eq!(
        game.apply_move(Mark::First, 3, 0),
        MoveOutcome::Rejected(RejectReason::InvalidMove)
    );
    assert_eq!(
        game.apply_move(Mark::First, 0, 7),
        MoveOutcome::Rejected(RejectReason::InvalidMove)
    );
}

#[test]
fn test_occupied_cell_rejection_leaves_board_unchanged() {
    let mut game = active_game();
    play(&mut game, &[(1, 1)]);
    let before = game.clone();

    for _ in 0..3 {
        assert_eq!(
            game.apply_move(Mark::Second, 1, 1),
            MoveOutcome::Rejected(RejectReason::InvalidMove)
        );
        assert_eq!(game, before);
    }
}

#[test]
fn test_top_row_wins_for_first() {
    // Reaches X X X / _ O _ / _ O _
    let mut game = active_game();
    let outcome = play(&mut game, &[(0, 0), (1, 1), (0, 1), (2, 1), (0, 2)]);

    assert_eq!(outcome.result(), Some(GameResult::Win(Mark::First)));
    assert_eq!(game.phase(), Phase::Finished);
    let MoveOutcome::Accepted { board, .. } = outcome else {
        panic!("winning move must be accepted");
    };
    let x = Cell::Occupied(Mark::First);
    assert_eq!(board.rows()[0], [x, x, x]);
}

#[test]
fn test_full_board_without_line_is_draw() {
    // X O X / X O O / O X X
    let mut game = active_game();
    let outcome = play(
        &mut game,
        &[(0, 0), (0, 1), (0, 2), (1, 1), (1, 0), (1, 2), (2, 1), (2, 0), (2, 2)],
    );
    assert_eq!(outcome.result(), Some(GameResult::Draw));
    assert_eq!(game.phase(), Phase::Finished);
}

#[test]
fn test_no_moves_after_finish() {
    let mut game = active_game();
    play(&mut game, &[(0, 0), (1, 1), (0, 1), (2, 1), (0, 2)]);
    let mark = game.turn();
    assert_eq!(
        game.apply_move(mark, 2, 2),
        MoveOutcome::Rejected(RejectReason::NoSession)
    );
}

#[test]
fn test_history_tracks_accepted_moves_only() {
    let mut game = active_game();
    play(&mut game, &[(2, 2)]);
    let _ = game.apply_move(Mark::Second, 2, 2);
    play(&mut game, &[(0, 0)]);
    assert_eq!(
        game.history(),
        &[Coord::new(2, 2).unwrap(), Coord::new(0, 0).unwrap()]
    );
}

#[test]
fn test_abandoned_game_refuses_moves() {
    let mut game = active_game();
    play(&mut game, &[(0, 0)]);
    assert_eq!(game.abandon(), Phase::InProgress);
    assert_eq!(game.phase(), Phase::Finished);

    let mark = game.turn();
    assert_eq!(
        game.apply_move(mark, 1, 1),
        MoveOutcome::Rejected(RejectReason::NoSession)
    );
    assert_eq!(game.moves_applied(), 1);
}
