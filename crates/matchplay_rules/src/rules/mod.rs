//! Game rules for tic-tac-toe.
//!
//! Pure functions over a [`Board`](crate::Board). They hold no state, so
//! [`GameState`](crate::GameState) and the automated opponents can share
//! them freely.

pub mod draw;
pub mod win;

pub use draw::is_full;
pub use win::{LINES, check_winner, has_line};
