//! Tic-tac-toe rules engine for matchplay.
//!
//! This crate holds everything a session needs to arbitrate a single game:
//! the board, the two marks, and the [`GameState`] state machine that
//! validates a move and decides whether the game continues, is won, or is
//! drawn. It performs no I/O and knows nothing about participants; mapping
//! identities to marks is the session layer's job.
//!
//! # Example
//!
//! ```
//! use matchplay_rules::{GameResult, GameState, Mark, MoveOutcome};
//!
//! let mut game = GameState::create();
//! game.activate().expect("fresh game is joinable");
//!
//! match game.apply_move(Mark::First, 1, 1) {
//!     MoveOutcome::Accepted { result, .. } => assert_eq!(result, GameResult::Continue),
//!     MoveOutcome::Rejected(reason) => panic!("unexpected rejection: {reason}"),
//! }
//! assert_eq!(game.turn(), Mark::Second);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod invariants;
mod state;
mod types;

pub mod rules;

pub use invariants::{Invariant, InvariantViolation, MarksBalanced, TurnMatchesCount, check_all};
pub use state::{GameResult, GameState, MoveOutcome, NotJoinable, Phase, RejectReason};
pub use types::{Board, Cell, Coord, Mark};
