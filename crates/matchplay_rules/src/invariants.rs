//! First-class invariants for tic-tac-toe.
//!
//! Invariants are logical properties that hold after every accepted move.
//! [`GameState`] checks them with `debug_assert!`; tests check them directly.

use crate::{GameState, Mark};
use tracing::warn;

/// A logical property that must hold for a game state.
pub trait Invariant {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &GameState) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Violation of an invariant.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("invariant violated: {description}")]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub description: &'static str,
}

/// First has played as many marks as Second, or exactly one more.
pub struct MarksBalanced;

impl Invariant for MarksBalanced {
    fn holds(state: &GameState) -> bool {
        let first = state.board().count(Mark::First);
        let second = state.board().count(Mark::Second);
        let valid = first == second || first == second + 1;
        if !valid {
            warn!(first, second, "Mark balance violated");
        }
        valid
    }

    fn description() -> &'static str {
        "First has the same number of marks as Second, or one more"
    }
}

/// The turn mark and the move counter agree with the board.
///
/// An even number of placed marks means First is to move; an odd number
/// means Second is.
pub struct TurnMatchesCount;

impl Invariant for TurnMatchesCount {
    fn holds(state: &GameState) -> bool {
        let filled = state.board().filled();
        let expected = if filled % 2 == 0 {
            Mark::First
        } else {
            Mark::Second
        };
        let valid = filled == state.moves_applied() && state.turn() == expected;
        if !valid {
            warn!(
                filled,
                moves = state.moves_applied(),
                turn = %state.turn(),
                "Turn/count consistency violated"
            );
        }
        valid
    }

    fn description() -> &'static str {
        "Placed marks equal moves applied and the turn follows from the count"
    }
}

/// Checks every invariant, collecting all violations.
pub fn check_all(state: &GameState) -> Result<(), Vec<InvariantViolation>> {
    let mut violations = Vec::new();

    if !MarksBalanced::holds(state) {
        violations.push(InvariantViolation {
            description: MarksBalanced::description(),
        });
    }

    if !TurnMatchesCount::holds(state) {
        violations.push(InvariantViolation {
            description: TurnMatchesCount::description(),
        });
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}
