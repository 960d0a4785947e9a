//! Human-vs-automated-opponent sessions.

use crate::ParticipantId;
use crate::predictor::{PredictorName, SharedPredictor, first_empty};
use chrono::{DateTime, Utc};
use matchplay_rules::{Board, Coord, GameResult, GameState, Mark, MoveOutcome, Phase, RejectReason};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, instrument, warn};

/// Mark the human plays in an automated session.
pub const HUMAN_MARK: Mark = Mark::First;

/// Mark the automated opponent plays.
pub const OPPONENT_MARK: Mark = Mark::Second;

/// Game result from the human's side of an automated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum VersusResult {
    /// Game goes on; the human moves next.
    #[display("continue")]
    Continue,
    /// The human completed a line.
    #[display("win")]
    Win,
    /// The automated opponent completed a line.
    #[display("opponent win")]
    OpponentWin,
    /// Board filled with no line.
    #[display("draw")]
    Draw,
}

impl VersusResult {
    /// Whether this result ends the game.
    pub fn is_terminal(self) -> bool {
        !matches!(self, VersusResult::Continue)
    }
}

/// Outcome of a human move in an automated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersusOutcome {
    /// The human move was applied, and the reply too when the game went on.
    Accepted {
        /// Board after both moves.
        board: Board,
        /// Combined result.
        result: VersusResult,
        /// Where the automated opponent played, if it moved.
        opponent_move: Option<Coord>,
    },
    /// The human move was refused; the opponent did not move.
    Rejected(RejectReason),
}

impl VersusOutcome {
    /// The combined result, for accepted moves.
    pub fn result(&self) -> Option<VersusResult> {
        match self {
            VersusOutcome::Accepted { result, .. } => Some(*result),
            VersusOutcome::Rejected(_) => None,
        }
    }
}

/// One game between a human and a [`MovePredictor`](crate::MovePredictor).
///
/// The game is in progress from the moment it opens. The automated side
/// never joins or leaves on its own.
pub struct AutomatedOpponentSession {
    participant: ParticipantId,
    state: GameState,
    predictor: SharedPredictor,
    opened_at: DateTime<Utc>,
}

impl fmt::Debug for AutomatedOpponentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomatedOpponentSession")
            .field("participant", &self.participant)
            .field("state", &self.state)
            .field("predictor", &PredictorName(&self.predictor))
            .field("opened_at", &self.opened_at)
            .finish()
    }
}

impl AutomatedOpponentSession {
    /// Opens a game for `human` against `predictor`.
    #[instrument(skip(predictor), fields(participant = %human))]
    pub fn open(human: ParticipantId, predictor: SharedPredictor) -> Self {
        let mut state = GameState::create();
        let activated = state.activate();
        debug_assert!(activated.is_ok(), "fresh game must activate");
        info!("Automated session opened");
        Self {
            participant: human,
            state,
            predictor,
            opened_at: Utc::now(),
        }
    }

    /// Plays the human move, then the opponent's reply if the game goes on.
    ///
    /// A refused human move returns immediately and the predictor is not
    /// consulted. A finishing human move also skips the predictor.
    #[instrument(skip(self), fields(participant = %self.participant))]
    pub fn play(&mut self, row: usize, col: usize) -> VersusOutcome {
        let (board, result) = match self.state.apply_move(HUMAN_MARK, row, col) {
            MoveOutcome::Rejected(reason) => {
                info!(%reason, "Human move rejected");
                return VersusOutcome::Rejected(reason);
            }
            MoveOutcome::Accepted { board, result } => (board, result),
        };

        match result {
            GameResult::Win(_) => {
                info!("Human won");
                return VersusOutcome::Accepted {
                    board,
                    result: VersusResult::Win,
                    opponent_move: None,
                };
            }
            GameResult::Draw => {
                info!("Draw after human move");
                return VersusOutcome::Accepted {
                    board,
                    result: VersusResult::Draw,
                    opponent_move: None,
                };
            }
            GameResult::Continue => {}
        }

        let reply = self.opponent_cell();
        match self.state.apply_move(OPPONENT_MARK, reply.row(), reply.col()) {
            MoveOutcome::Accepted { board, result } => {
                let result = match result {
                    GameResult::Win(_) => VersusResult::OpponentWin,
                    GameResult::Draw => VersusResult::Draw,
                    GameResult::Continue => VersusResult::Continue,
                };
                info!(coord = %reply, %result, "Opponent replied");
                VersusOutcome::Accepted {
                    board,
                    result,
                    opponent_move: Some(reply),
                }
            }
            MoveOutcome::Rejected(reason) => {
                // Unreachable: the reply cell was checked against this board.
                error!(coord = %reply, %reason, "Opponent reply refused");
                VersusOutcome::Accepted {
                    board: self.state.board().clone(),
                    result: VersusResult::Continue,
                    opponent_move: None,
                }
            }
        }
    }

    /// Asks the predictor for a cell, falling back to the lowest-index
    /// empty cell when it proposes an occupied one.
    fn opponent_cell(&self) -> Coord {
        let board = self.state.board();
        let proposed = self.predictor.select_move(board, OPPONENT_MARK);
        if board.is_empty(proposed) {
            return proposed;
        }

        let fallback = first_empty(board).unwrap_or(proposed);
        warn!(%proposed, %fallback, "Predictor chose an occupied cell, using fallback");
        fallback
    }

    /// Ends the game and returns the phase it had.
    pub fn close(&mut self) -> Phase {
        self.state.abandon()
    }

    /// The human participant.
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Underlying game.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// When the session was opened.
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }
}
