//! Line-completion win detection.

use crate::{Board, Cell, Coord, Mark};
use strum::IntoEnumIterator;
use tracing::instrument;

const fn at(row: usize, col: usize) -> Coord {
    Coord::ALL[row * Coord::SIDE + col]
}

/// The eight winning lines: three rows, three columns, two diagonals.
pub const LINES: [[Coord; 3]; 8] = [
    // Rows
    [at(0, 0), at(0, 1), at(0, 2)],
    [at(1, 0), at(1, 1), at(1, 2)],
    [at(2, 0), at(2, 1), at(2, 2)],
    // Columns
    [at(0, 0), at(1, 0), at(2, 0)],
    [at(0, 1), at(1, 1), at(2, 1)],
    [at(0, 2), at(1, 2), at(2, 2)],
    // Diagonals
    [at(0, 0), at(1, 1), at(2, 2)],
    [at(0, 2), at(1, 1), at(2, 0)],
];

/// Whether `mark` occupies all three cells of any line.
#[instrument(skip(board))]
pub fn has_line(board: &Board, mark: Mark) -> bool {
    let target = Cell::Occupied(mark);
    LINES
        .iter()
        .any(|line| line.iter().all(|coord| board.get(*coord) == target))
}

/// Returns the mark holding a complete line, if any.
///
/// Boards reached through legal play have at most one such mark; First
/// is reported first if a hand-built board has both.
#[instrument(skip(board))]
pub fn check_winner(board: &Board) -> Option<Mark> {
    Mark::iter().find(|mark| has_line(board, *mark))
}
