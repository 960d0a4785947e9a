//! Core domain types for tic-tac-toe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mark played by a participant.
///
/// `First` always opens the game and is rendered as `X`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum::EnumIter,
)]
pub enum Mark {
    /// Opening mark (X).
    #[display("X")]
    First,
    /// Answering mark (O).
    #[display("O")]
    Second,
}

impl Mark {
    /// Returns the other mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::First => Mark::Second,
            Mark::Second => Mark::First,
        }
    }
}

/// A single cell of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    /// Nobody has played here.
    Empty,
    /// Cell holds a mark.
    Occupied(Mark),
}

impl Cell {
    /// Returns the mark in this cell, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::Occupied(mark) => Some(mark),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => write!(f, "."),
            Cell::Occupied(mark) => write!(f, "{mark}"),
        }
    }
}

/// In-range board coordinate.
///
/// A `Coord` can only be built for `row` and `col` in `0..=2`, so holding
/// one means the position exists on the board. Occupancy is a separate
/// question answered by [`Board::is_empty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    row: usize,
    col: usize,
}

impl Coord {
    /// Side length of the board.
    pub const SIDE: usize = 3;

    /// All nine coordinates in row-major order.
    pub const ALL: [Coord; 9] = [
        Coord { row: 0, col: 0 },
        Coord { row: 0, col: 1 },
        Coord { row: 0, col: 2 },
        Coord { row: 1, col: 0 },
        Coord { row: 1, col: 1 },
        Coord { row: 1, col: 2 },
        Coord { row: 2, col: 0 },
        Coord { row: 2, col: 1 },
        Coord { row: 2, col: 2 },
    ];

    /// Builds a coordinate, or `None` when either axis is out of range.
    pub fn new(row: usize, col: usize) -> Option<Self> {
        (row < Self::SIDE && col < Self::SIDE).then_some(Self { row, col })
    }

    /// Builds a coordinate from a row-major index (0-8).
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Row-major index (0-8).
    pub fn index(self) -> usize {
        self.row * Self::SIDE + self.col
    }

    /// Row (0-2).
    pub fn row(self) -> usize {
        self.row
    }

    /// Column (0-2).
    pub fn col(self) -> usize {
        self.col
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// 3x3 tic-tac-toe board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    /// Cells in row-major order.
    cells: [Cell; 9],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; 9],
        }
    }

    /// Builds a board from three rows of cells.
    pub fn from_rows(rows: [[Cell; 3]; 3]) -> Self {
        let mut board = Self::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                board.cells[r * Coord::SIDE + c] = *cell;
            }
        }
        board
    }

    /// Returns the cell at `coord`.
    pub fn get(&self, coord: Coord) -> Cell {
        self.cells[coord.index()]
    }

    /// Writes a cell. Validation lives in [`crate::GameState::apply_move`].
    pub(crate) fn set(&mut self, coord: Coord, cell: Cell) {
        self.cells[coord.index()] = cell;
    }

    /// Whether the cell at `coord` is empty.
    pub fn is_empty(&self, coord: Coord) -> bool {
        self.get(coord) == Cell::Empty
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Cell; 9] {
        &self.cells
    }

    /// The board as three rows.
    pub fn rows(&self) -> [[Cell; 3]; 3] {
        let c = &self.cells;
        [[c[0], c[1], c[2]], [c[3], c[4], c[5]], [c[6], c[7], c[8]]]
    }

    /// Empty coordinates in row-major order.
    pub fn empty_cells(&self) -> impl Iterator<Item = Coord> + '_ {
        Coord::ALL.into_iter().filter(|coord| self.is_empty(*coord))
    }

    /// Number of cells holding `mark`.
    pub fn count(&self, mark: Mark) -> usize {
        self.cells
            .iter()
            .filter(|cell| **cell == Cell::Occupied(mark))
            .count()
    }

    /// Number of non-empty cells.
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|cell| **cell != Cell::Empty).count()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.rows().iter().enumerate() {
            write!(f, "{}|{}|{}", row[0], row[1], row[2])?;
            if r < Coord::SIDE - 1 {
                write!(f, "\n-+-+-\n")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_rejects_out_of_range() {
        assert!(Coord::new(3, 0).is_none());
        assert!(Coord::new(0, 3).is_none());
        assert_eq!(Coord::new(2, 1).map(Coord::index), Some(7));
    }

    #[test]
    fn test_coord_index_round_trip_covers_board() {
        for (i, coord) in Coord::ALL.iter().enumerate() {
            assert_eq!(coord.index(), i);
            assert_eq!(Coord::from_index(i), Some(*coord));
        }
        assert!(Coord::from_index(9).is_none());
    }

    #[test]
    fn test_display_renders_rows() {
        let x = Cell::Occupied(Mark::First);
        let o = Cell::Occupied(Mark::Second);
        let e = Cell::Empty;
        let board = Board::from_rows([[x, o, e], [e, x, e], [e, e, o]]);
        assert_eq!(board.to_string(), "X|O|.\n-+-+-\n.|X|.\n-+-+-\n.|.|O");
    }

    #[test]
    fn test_empty_cells_in_row_major_order() {
        let x = Cell::Occupied(Mark::First);
        let e = Cell::Empty;
        let board = Board::from_rows([[x, e, x], [x, x, x], [x, x, e]]);
        let empty: Vec<_> = board.empty_cells().map(Coord::index).collect();
        assert_eq!(empty, vec![1, 8]);
    }
}
