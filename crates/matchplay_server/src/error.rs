//! Session-level error kinds.
//!
//! All of these are recoverable: the dispatcher turns them into a message
//! for the requesting participant and carries on.

use matchplay_rules::NotJoinable;

/// Error from a session or registry operation.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum SessionError {
    /// The targeted session or board is not in an active, joined state.
    #[display("No active session")]
    NoSession,

    /// The identity is not a participant of the targeted session.
    #[display("Not a participant of this session")]
    NoPlayer,

    /// Coordinates are out of range or the cell is taken.
    #[display("Invalid move")]
    InvalidMove,

    /// The session is not waiting for a second participant.
    #[display("Session is not joinable")]
    NotJoinable,

    /// The session already has two participants.
    #[display("Session already has two participants")]
    Full,

    /// No session matches the token or identity.
    #[display("Session not found")]
    NotFound,

    /// Turn order asked for before the second participant joined.
    #[display("Session is waiting for a second participant")]
    IncompletePlayers,

    /// The identity already takes part in a session.
    #[display("Already taking part in a session")]
    AlreadyInSession,
}

impl From<NotJoinable> for SessionError {
    fn from(_: NotJoinable) -> Self {
        SessionError::NotJoinable
    }
}
