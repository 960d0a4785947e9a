//! The in-memory collection of active sessions.
//!
//! One registry-wide lock covers every structural operation from lookup to
//! mutation, so no caller sees a half-joined or half-removed session. Each
//! session additionally sits behind its own lock, which serializes moves on
//! that session without blocking the rest of the registry. The registry lock
//! is always taken before a session lock, never the reverse.

use crate::predictor::SharedPredictor;
use crate::{AutomatedOpponentSession, ParticipantId, Session, SessionError, SessionSnapshot, SessionToken};
use derive_getters::Getters;
use matchplay_rules::Phase;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Locks a mutex, recovering the data if a holder panicked.
///
/// Sessions only change after a move has been validated, so a poisoned
/// session is still consistent.
pub fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to a live session.
#[derive(Debug, Clone)]
pub enum SessionHandle {
    /// Human-vs-human session.
    Human(Arc<Mutex<Session>>),
    /// Session against the automated opponent.
    Automated(Arc<Mutex<AutomatedOpponentSession>>),
}

impl SessionHandle {
    /// Phase of the underlying game.
    pub fn phase(&self) -> Phase {
        match self {
            SessionHandle::Human(session) => relock(session).phase(),
            SessionHandle::Automated(session) => relock(session).state().phase(),
        }
    }

    /// The human session, if this is one.
    pub fn as_human(&self) -> Option<&Arc<Mutex<Session>>> {
        match self {
            SessionHandle::Human(session) => Some(session),
            SessionHandle::Automated(_) => None,
        }
    }

    /// The automated session, if this is one.
    pub fn as_automated(&self) -> Option<&Arc<Mutex<AutomatedOpponentSession>>> {
        match self {
            SessionHandle::Automated(session) => Some(session),
            SessionHandle::Human(_) => None,
        }
    }
}

/// A session waiting for its second participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct JoinableSession {
    token: SessionToken,
    initiator: ParticipantId,
}

/// What was torn down by a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovedSession {
    /// A human-vs-human session.
    Human {
        /// Join token of the removed session.
        token: SessionToken,
        /// Every participant that was attached.
        participants: Vec<ParticipantId>,
        /// Phase at removal time.
        phase: Phase,
    },
    /// An automated session.
    Automated {
        /// The human participant.
        participant: ParticipantId,
        /// Phase at removal time.
        phase: Phase,
    },
}

impl RemovedSession {
    /// Phase the game was in when it was removed.
    pub fn phase(&self) -> Phase {
        match self {
            RemovedSession::Human { phase, .. } | RemovedSession::Automated { phase, .. } => *phase,
        }
    }

    /// The participant other than `identity`, for human sessions.
    pub fn partner_of(&self, identity: &ParticipantId) -> Option<&ParticipantId> {
        match self {
            RemovedSession::Human { participants, .. } => participants.iter().find(|p| *p != identity),
            RemovedSession::Automated { .. } => None,
        }
    }
}

#[derive(Debug)]
struct OpenSession {
    seq: u64,
    session: Arc<Mutex<Session>>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    sessions: HashMap<SessionToken, OpenSession>,
    by_participant: HashMap<ParticipantId, SessionToken>,
    automated: HashMap<ParticipantId, Arc<Mutex<AutomatedOpponentSession>>>,
    last_seed: u64,
    next_seq: u64,
}

impl RegistryInner {
    fn is_engaged(&self, identity: &ParticipantId) -> bool {
        self.by_participant.contains_key(identity) || self.automated.contains_key(identity)
    }

    /// Next join token: current Unix seconds, bumped past the last issued
    /// value so tokens strictly increase.
    fn next_token(&mut self) -> SessionToken {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        let mut seed = now.max(self.last_seed + 1);
        while self.sessions.contains_key(&SessionToken::from(seed.to_string())) {
            seed += 1;
        }
        self.last_seed = seed;
        SessionToken::from(seed.to_string())
    }

    fn remove_human(&mut self, token: &SessionToken) -> Option<RemovedSession> {
        let open = self.sessions.remove(token)?;
        let mut session = relock(&open.session);
        let phase = session.close();
        let participants: Vec<ParticipantId> =
            session.participants().iter().map(|p| p.id().clone()).collect();
        for participant in &participants {
            if self.by_participant.get(participant) == Some(token) {
                self.by_participant.remove(participant);
            }
        }
        Some(RemovedSession::Human {
            token: token.clone(),
            participants,
            phase,
        })
    }
}

/// Registry of active human and automated sessions.
///
/// Clones share the same underlying collection.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        relock(&self.inner)
    }

    /// Opens a session for `initiator` and returns its join token.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyInSession`] if the initiator already takes part
    /// in a human or automated session.
    #[instrument(skip(self), fields(initiator = %initiator))]
    pub fn create_session(&self, initiator: &ParticipantId) -> Result<SessionToken, SessionError> {
        let mut inner = self.lock();
        if inner.is_engaged(initiator) {
            warn!("Initiator already in a session");
            return Err(SessionError::AlreadyInSession);
        }

        let token = inner.next_token();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let session = Session::open(initiator.clone(), token.clone());
        inner.sessions.insert(
            token.clone(),
            OpenSession {
                seq,
                session: Arc::new(Mutex::new(session)),
            },
        );
        inner.by_participant.insert(initiator.clone(), token.clone());
        info!(session_token = %token, "Session created");
        Ok(token)
    }

    /// Joins `identity` to the session behind `token` and starts the game.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] for an unknown token,
    /// [`SessionError::Full`] or [`SessionError::NotJoinable`] when the
    /// session already has its second participant, and
    /// [`SessionError::AlreadyInSession`] if `identity` is busy elsewhere.
    #[instrument(skip(self), fields(session_token = %token, participant = %identity))]
    pub fn join_session(
        &self,
        token: &SessionToken,
        identity: &ParticipantId,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut inner = self.lock();
        if inner.is_engaged(identity) {
            warn!("Participant already in a session");
            return Err(SessionError::AlreadyInSession);
        }
        let Some(open) = inner.sessions.get(token) else {
            debug!("No session for token");
            return Err(SessionError::NotFound);
        };

        let snapshot = {
            let mut session = relock(&open.session);
            session.join(identity.clone())?;
            session.snapshot()
        };
        inner.by_participant.insert(identity.clone(), token.clone());
        info!("Session joined");
        Ok(snapshot)
    }

    /// Opens a game against `predictor` for `identity`.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyInSession`] if `identity` already plays.
    #[instrument(skip(self, predictor), fields(participant = %identity))]
    pub fn create_automated_session(
        &self,
        identity: &ParticipantId,
        predictor: SharedPredictor,
    ) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.is_engaged(identity) {
            warn!("Participant already in a session");
            return Err(SessionError::AlreadyInSession);
        }
        let session = AutomatedOpponentSession::open(identity.clone(), predictor);
        inner
            .automated
            .insert(identity.clone(), Arc::new(Mutex::new(session)));
        Ok(())
    }

    /// The session `identity` takes part in, human or automated.
    pub fn find_by_participant(&self, identity: &ParticipantId) -> Option<SessionHandle> {
        let inner = self.lock();
        if let Some(session) = inner.automated.get(identity) {
            return Some(SessionHandle::Automated(Arc::clone(session)));
        }
        let token = inner.by_participant.get(identity)?;
        inner
            .sessions
            .get(token)
            .map(|open| SessionHandle::Human(Arc::clone(&open.session)))
    }

    /// The session behind `token`, only while it waits for a second player.
    pub fn find_by_token(&self, token: &SessionToken) -> Option<SessionHandle> {
        let inner = self.lock();
        let open = inner.sessions.get(token)?;
        let joinable = relock(&open.session).phase() == Phase::AwaitingSecondPlayer;
        joinable.then(|| SessionHandle::Human(Arc::clone(&open.session)))
    }

    /// Sessions waiting for a second participant, oldest first.
    pub fn list_joinable(&self) -> Vec<JoinableSession> {
        let inner = self.lock();
        let mut open: Vec<(u64, JoinableSession)> = inner
            .sessions
            .iter()
            .filter_map(|(token, open)| {
                let session = relock(&open.session);
                (session.phase() == Phase::AwaitingSecondPlayer).then(|| {
                    (
                        open.seq,
                        JoinableSession {
                            token: token.clone(),
                            initiator: session.initiator().clone(),
                        },
                    )
                })
            })
            .collect();
        open.sort_by_key(|(seq, _)| *seq);
        open.into_iter().map(|(_, joinable)| joinable).collect()
    }

    /// Removes the human session behind `token`.
    #[instrument(skip(self), fields(session_token = %token))]
    pub fn remove_session(&self, token: &SessionToken) -> Option<RemovedSession> {
        let removed = self.lock().remove_human(token);
        if removed.is_some() {
            info!("Session removed");
        }
        removed
    }

    /// Removes the automated session of `identity`.
    #[instrument(skip(self), fields(participant = %identity))]
    pub fn remove_automated_session(&self, identity: &ParticipantId) -> Option<RemovedSession> {
        let session = self.lock().automated.remove(identity)?;
        let phase = relock(&session).close();
        info!("Automated session removed");
        Some(RemovedSession::Automated {
            participant: identity.clone(),
            phase,
        })
    }

    /// Removes whatever session `identity` takes part in.
    #[instrument(skip(self), fields(participant = %identity))]
    pub fn remove_for_participant(&self, identity: &ParticipantId) -> Option<RemovedSession> {
        let mut inner = self.lock();
        if let Some(session) = inner.automated.remove(identity) {
            let phase = relock(&session).close();
            info!("Automated session removed");
            return Some(RemovedSession::Automated {
                participant: identity.clone(),
                phase,
            });
        }
        let token = inner.by_participant.get(identity)?.clone();
        let removed = inner.remove_human(&token);
        info!(session_token = %token, "Session removed");
        removed
    }

    /// Number of human sessions, joinable or not.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Number of automated sessions.
    pub fn automated_count(&self) -> usize {
        self.lock().automated.len()
    }
}
