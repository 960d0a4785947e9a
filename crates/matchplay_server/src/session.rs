//! Human-vs-human game sessions.

use crate::{ParticipantId, SessionError, SessionToken};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use matchplay_rules::{Board, GameState, Mark, MoveOutcome, Phase, RejectReason};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// A participant and the mark they play for the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Participant {
    id: ParticipantId,
    mark: Mark,
}

/// Point-in-time view of a session, safe to hand out after the lock is
/// released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct SessionSnapshot {
    token: SessionToken,
    first: ParticipantId,
    second: Option<ParticipantId>,
    board: Board,
    turn: Mark,
    phase: Phase,
}

/// One game between two humans, reachable by its join token.
///
/// The initiator always plays [`Mark::First`]; whoever joins plays
/// [`Mark::Second`]. A session with one participant is joinable, a
/// session with two is not.
#[derive(Debug, Clone)]
pub struct Session {
    token: SessionToken,
    participants: Vec<Participant>,
    state: GameState,
    opened_at: DateTime<Utc>,
}

impl Session {
    /// Opens a session for `initiator` under a registry-issued `token`.
    #[instrument(skip_all, fields(session_token = %token, initiator = %initiator))]
    pub fn open(initiator: ParticipantId, token: SessionToken) -> Self {
        info!("Opening session");
        Self {
            token,
            participants: vec![Participant {
                id: initiator,
                mark: Mark::First,
            }],
            state: GameState::create(),
            opened_at: Utc::now(),
        }
    }

    /// Attaches a second participant as [`Mark::Second`] and starts the game.
    ///
    /// # Errors
    ///
    /// [`SessionError::Full`] if two participants are already attached,
    /// [`SessionError::NotJoinable`] if the game is past its opening phase.
    #[instrument(skip(self), fields(session_token = %self.token))]
    pub fn join(&mut self, identity: ParticipantId) -> Result<Board, SessionError> {
        if self.participants.len() >= 2 {
            warn!(participant = %identity, "Session already has 2 participants");
            return Err(SessionError::Full);
        }
        if self.state.phase() != Phase::AwaitingSecondPlayer {
            warn!(participant = %identity, phase = %self.state.phase(), "Session not joinable");
            return Err(SessionError::NotJoinable);
        }

        self.participants.push(Participant {
            id: identity,
            mark: Mark::Second,
        });
        let board = self.state.activate()?;
        info!("Second participant joined, game started");
        Ok(board)
    }

    /// Mark played by `identity`, if they take part.
    pub fn mark_of(&self, identity: &ParticipantId) -> Option<Mark> {
        self.participants
            .iter()
            .find(|p| &p.id == identity)
            .map(|p| p.mark)
    }

    fn identity_for(&self, mark: Mark) -> Result<&ParticipantId, SessionError> {
        if self.participants.len() < 2 {
            return Err(SessionError::IncompletePlayers);
        }
        self.participants
            .iter()
            .find(|p| p.mark == mark)
            .map(|p| &p.id)
            .ok_or(SessionError::IncompletePlayers)
    }

    /// Identity whose mark holds the turn.
    ///
    /// # Errors
    ///
    /// [`SessionError::IncompletePlayers`] before the second participant joins.
    pub fn current_turn_identity(&self) -> Result<&ParticipantId, SessionError> {
        self.identity_for(self.state.turn())
    }

    /// Identity waiting for the other side to move.
    ///
    /// # Errors
    ///
    /// [`SessionError::IncompletePlayers`] before the second participant joins.
    pub fn waiting_identity(&self) -> Result<&ParticipantId, SessionError> {
        self.identity_for(self.state.turn().opponent())
    }

    /// The other participant, if attached.
    pub fn opponent_of(&self, identity: &ParticipantId) -> Option<&ParticipantId> {
        if !self.contains_participant(identity) {
            return None;
        }
        self.participants
            .iter()
            .find(|p| &p.id != identity)
            .map(|p| &p.id)
    }

    /// Plays a move for `identity`.
    ///
    /// Callers check `identity == current_turn_identity()` first and answer
    /// an out-of-turn request themselves. Turn ownership is still enforced
    /// here: the identity resolves to its mark, and the rules engine refuses
    /// a mark that does not hold the turn with [`RejectReason::OutOfTurn`].
    #[instrument(skip(self), fields(session_token = %self.token))]
    pub fn play(&mut self, identity: &ParticipantId, row: usize, col: usize) -> MoveOutcome {
        let Some(mark) = self.mark_of(identity) else {
            warn!(participant = %identity, "Unknown participant attempted move");
            return MoveOutcome::Rejected(RejectReason::NoPlayer);
        };

        let outcome = self.state.apply_move(mark, row, col);
        match &outcome {
            MoveOutcome::Accepted { result, .. } => {
                info!(participant = %identity, %mark, row, col, %result, "Move accepted");
            }
            MoveOutcome::Rejected(reason) => {
                debug!(participant = %identity, %mark, row, col, %reason, "Move rejected");
            }
        }
        outcome
    }

    /// Ends the game for a session leaving the registry and returns the
    /// phase it had. A move still in flight on a detached handle is then
    /// refused.
    pub fn close(&mut self) -> Phase {
        self.state.abandon()
    }

    /// Whether `identity` takes part in this session.
    pub fn contains_participant(&self, identity: &ParticipantId) -> bool {
        self.participants.iter().any(|p| &p.id == identity)
    }

    /// Copies the externally visible state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            token: self.token.clone(),
            first: self.participants[0].id.clone(),
            second: self.participants.get(1).map(|p| p.id.clone()),
            board: self.state.board().clone(),
            turn: self.state.turn(),
            phase: self.state.phase(),
        }
    }

    /// Join token.
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Identity that opened the session.
    pub fn initiator(&self) -> &ParticipantId {
        &self.participants[0].id
    }

    /// Attached participants, initiator first.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Underlying game.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Game phase.
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// When the session was opened.
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchplay_rules::GameResult;

    fn id(name: &str) -> ParticipantId {
        ParticipantId::from(name)
    }

    fn joined() -> Session {
        let mut session = Session::open("alice".into(), "100".into());
        session.join("bob".into()).expect("join succeeds");
        session
    }

    #[test]
    fn test_turn_identities_require_second_player() {
        let session = Session::open("alice".into(), "100".into());
        assert_eq!(
            session.current_turn_identity(),
            Err(SessionError::IncompletePlayers)
        );
        assert_eq!(session.waiting_identity(), Err(SessionError::IncompletePlayers));
    }

    #[test]
    fn test_join_assigns_second_mark_and_activates() {
        let session = joined();
        assert_eq!(session.phase(), Phase::InProgress);
        assert_eq!(session.mark_of(&"bob".into()), Some(Mark::Second));
        assert_eq!(session.current_turn_identity(), Ok(&id("alice")));
        assert_eq!(session.waiting_identity(), Ok(&id("bob")));
    }

    #[test]
    fn test_third_participant_is_rejected() {
        let mut session = joined();
        assert_eq!(session.join("carol".into()), Err(SessionError::Full));
        assert_eq!(session.participants().len(), 2);
    }

    #[test]
    fn test_outsider_move_is_no_player() {
        let mut session = joined();
        assert_eq!(
            session.play(&"mallory".into(), 0, 0),
            MoveOutcome::Rejected(RejectReason::NoPlayer)
        );
    }

    #[test]
    fn test_waiting_participant_cannot_move() {
        let mut session = joined();
        assert_eq!(
            session.play(&"bob".into(), 0, 0),
            MoveOutcome::Rejected(RejectReason::OutOfTurn)
        );
        assert_eq!(session.state().moves_applied(), 0);
    }

    #[test]
    fn test_turn_passes_after_move() {
        let mut session = joined();
        let outcome = session.play(&"alice".into(), 1, 1);
        assert_eq!(outcome.result(), Some(GameResult::Continue));
        assert_eq!(session.current_turn_identity(), Ok(&id("bob")));
    }

    #[test]
    fn test_opponent_of() {
        let session = joined();
        assert_eq!(session.opponent_of(&"alice".into()), Some(&id("bob")));
        assert_eq!(session.opponent_of(&"bob".into()), Some(&id("alice")));
        assert_eq!(session.opponent_of(&"carol".into()), None);
    }
}
