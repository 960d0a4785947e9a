//! Move selection for the automated opponent.
//!
//! The session layer treats a predictor as an opaque `board -> cell`
//! function. Whatever it returns is validated against the board before use;
//! see [`AutomatedOpponentSession`](crate::AutomatedOpponentSession).

use matchplay_rules::rules::LINES;
use matchplay_rules::{Board, Cell, Coord, Mark};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Chooses the automated side's next cell.
///
/// Implementations are expected to return an empty cell and to have no
/// side effects visible to the session.
pub trait MovePredictor: Send + Sync {
    /// Picks a cell for `mark` on `board`.
    fn select_move(&self, board: &Board, mark: Mark) -> Coord;
}

impl<F> MovePredictor for F
where
    F: Fn(&Board, Mark) -> Coord + Send + Sync,
{
    fn select_move(&self, board: &Board, mark: Mark) -> Coord {
        self(board, mark)
    }
}

/// Shared predictor handle stored in automated sessions.
pub type SharedPredictor = Arc<dyn MovePredictor>;

/// Lowest-index empty cell, or `None` on a full board.
pub fn first_empty(board: &Board) -> Option<Coord> {
    board.empty_cells().next()
}

/// Picks the first empty cell in row-major order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstEmpty;

impl MovePredictor for FirstEmpty {
    fn select_move(&self, board: &Board, _mark: Mark) -> Coord {
        // A full board never reaches the predictor; the origin is a
        // harmless answer the session's fallback would replace anyway.
        first_empty(board).unwrap_or(Coord::ALL[0])
    }
}

/// Greedy line heuristic.
///
/// In order of preference: complete an own line, block the opponent's
/// line, take the centre, take a corner, take anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineSeeker;

impl LineSeeker {
    const CENTRE: usize = 4;
    const CORNERS: [usize; 4] = [0, 2, 6, 8];

    /// Empty cell that would give `mark` a complete line.
    fn completing_cell(board: &Board, mark: Mark) -> Option<Coord> {
        LINES.iter().find_map(|line| {
            let owned = line
                .iter()
                .filter(|c| board.get(**c) == Cell::Occupied(mark))
                .count();
            let empty: Vec<Coord> = line.iter().copied().filter(|c| board.is_empty(*c)).collect();
            (owned == 2 && empty.len() == 1).then(|| empty[0])
        })
    }
}

impl MovePredictor for LineSeeker {
    #[instrument(skip(self, board))]
    fn select_move(&self, board: &Board, mark: Mark) -> Coord {
        if let Some(coord) = Self::completing_cell(board, mark) {
            debug!(%coord, "Completing line");
            return coord;
        }
        if let Some(coord) = Self::completing_cell(board, mark.opponent()) {
            debug!(%coord, "Blocking line");
            return coord;
        }

        let preferred = std::iter::once(Self::CENTRE)
            .chain(Self::CORNERS)
            .filter_map(Coord::from_index)
            .find(|c| board.is_empty(*c));

        preferred
            .or_else(|| first_empty(board))
            .unwrap_or(Coord::ALL[0])
    }
}

/// Built-in predictor selection, as named in configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PredictorKind {
    /// [`FirstEmpty`].
    FirstEmpty,
    /// [`LineSeeker`].
    #[default]
    LineSeeker,
}

impl PredictorKind {
    /// Builds the predictor.
    pub fn build(self) -> SharedPredictor {
        match self {
            PredictorKind::FirstEmpty => Arc::new(FirstEmpty),
            PredictorKind::LineSeeker => Arc::new(LineSeeker),
        }
    }
}

/// Debug adapter so handles can sit inside `#[derive(Debug)]` types.
pub(crate) struct PredictorName<'a>(pub(crate) &'a SharedPredictor);

impl fmt::Debug for PredictorName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MovePredictor@{:p}", Arc::as_ptr(self.0))
    }
}
