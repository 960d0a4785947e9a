//! Game state machine: phase, turn pointer, and move arbitration.

use crate::rules::{has_line, is_full};
use crate::{Board, Cell, Coord, Mark};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Lifecycle phase of a game. Only ever moves forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum Phase {
    /// Opened by one participant, waiting for a second.
    #[display("awaiting second player")]
    AwaitingSecondPlayer,
    /// Both sides attached; moves are accepted.
    #[display("in progress")]
    InProgress,
    /// Won or drawn; no further moves.
    #[display("finished")]
    Finished,
}

/// Result of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum GameResult {
    /// Game goes on.
    #[display("continue")]
    Continue,
    /// The given mark completed a line.
    #[display("{_0} wins")]
    Win(Mark),
    /// Board is full with no completed line.
    #[display("draw")]
    Draw,
}

impl GameResult {
    /// Whether this result ends the game.
    pub fn is_terminal(self) -> bool {
        !matches!(self, GameResult::Continue)
    }
}

/// Why a move was refused. A refused move never changes the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum RejectReason {
    /// The game is not in progress (not joined yet, or already over).
    #[display("no active game")]
    NoSession,
    /// The mover is not a participant of this game.
    #[display("not a participant")]
    NoPlayer,
    /// The mover's mark does not hold the turn.
    #[display("not your turn")]
    OutOfTurn,
    /// Coordinates are off the board or the cell is taken.
    #[display("invalid move")]
    InvalidMove,
}

/// Outcome of a move attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveOutcome {
    /// The move was applied.
    Accepted {
        /// Board after the move.
        board: Board,
        /// What the move did to the game.
        result: GameResult,
    },
    /// The move was refused; state is unchanged.
    Rejected(RejectReason),
}

impl MoveOutcome {
    /// Whether the move was applied.
    pub fn is_accepted(&self) -> bool {
        matches!(self, MoveOutcome::Accepted { .. })
    }

    /// The game result, for accepted moves.
    pub fn result(&self) -> Option<GameResult> {
        match self {
            MoveOutcome::Accepted { result, .. } => Some(*result),
            MoveOutcome::Rejected(_) => None,
        }
    }
}

/// Activation attempted on a game that is not waiting for a second player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("game cannot be joined while {phase}")]
pub struct NotJoinable {
    /// Phase the game was in.
    pub phase: Phase,
}

/// Complete state of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    board: Board,
    turn: Mark,
    phase: Phase,
    /// Accepted moves in order.
    history: Vec<Coord>,
}

impl GameState {
    /// Creates an empty game with First to move, awaiting a second player.
    #[instrument]
    pub fn create() -> Self {
        Self {
            board: Board::new(),
            turn: Mark::First,
            phase: Phase::AwaitingSecondPlayer,
            history: Vec::new(),
        }
    }

    /// Moves the game from AwaitingSecondPlayer to InProgress.
    ///
    /// The caller attaches the second participant before calling this.
    ///
    /// # Errors
    ///
    /// Returns [`NotJoinable`] if the game was already activated or finished.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub fn activate(&mut self) -> Result<Board, NotJoinable> {
        if self.phase != Phase::AwaitingSecondPlayer {
            return Err(NotJoinable { phase: self.phase });
        }
        self.phase = Phase::InProgress;
        debug!("Game activated");
        Ok(self.board.clone())
    }

    /// Ends the game without a result. Later moves are refused with
    /// [`RejectReason::NoSession`]. Returns the phase it was in before.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub fn abandon(&mut self) -> Phase {
        let previous = self.phase;
        self.phase = Phase::Finished;
        debug!("Game abandoned");
        previous
    }

    /// Validates and applies a move for `mark` at (`row`, `col`).
    ///
    /// Checks, in order: the game is in progress, `mark` holds the turn,
    /// the coordinates are on the board, the cell is empty. Only the mark
    /// that just moved is checked for a completed line.
    #[instrument(skip(self), fields(phase = %self.phase, turn = %self.turn))]
    pub fn apply_move(&mut self, mark: Mark, row: usize, col: usize) -> MoveOutcome {
        if self.phase != Phase::InProgress {
            debug!("Move refused: game not in progress");
            return MoveOutcome::Rejected(RejectReason::NoSession);
        }

        if mark != self.turn {
            debug!("Move refused: out of turn");
            return MoveOutcome::Rejected(RejectReason::OutOfTurn);
        }

        let Some(coord) = Coord::new(row, col) else {
            debug!("Move refused: off the board");
            return MoveOutcome::Rejected(RejectReason::InvalidMove);
        };

        if !self.board.is_empty(coord) {
            debug!(%coord, "Move refused: cell occupied");
            return MoveOutcome::Rejected(RejectReason::InvalidMove);
        }

        self.board.set(coord, Cell::Occupied(mark));
        self.history.push(coord);
        self.turn = mark.opponent();

        let result = if has_line(&self.board, mark) {
            GameResult::Win(mark)
        } else if is_full(&self.board) {
            GameResult::Draw
        } else {
            GameResult::Continue
        };

        if result.is_terminal() {
            self.phase = Phase::Finished;
        }

        debug_assert!(
            crate::check_all(self).is_ok(),
            "game invariants violated after move"
        );

        debug!(%coord, %result, "Move applied");
        MoveOutcome::Accepted {
            board: self.board.clone(),
            result,
        }
    }

    /// The board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Mark that moves next.
    pub fn turn(&self) -> Mark {
        self.turn
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Accepted moves in order.
    pub fn history(&self) -> &[Coord] {
        &self.history
    }

    /// Number of accepted moves.
    pub fn moves_applied(&self) -> usize {
        self.history.len()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::create()
    }
}
