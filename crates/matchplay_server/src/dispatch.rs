//! Routing of inbound participant events.
//!
//! A transport turns whatever its clients send into [`InboundEvent`]s and
//! delivers the returned [`Notice`]s. The dispatcher owns no state of its
//! own: everything lives in the tracker, the registry and the store.

use crate::predictor::SharedPredictor;
use crate::registry::relock;
use crate::store::{LeaderEntry, ScoreCard, ScoreStore, StoreError};
use crate::{
    JoinableSession, ParticipantId, PresenceTracker, SessionError, SessionHandle, SessionRegistry,
    SessionToken, Status, VersusOutcome, VersusResult,
};
use derive_getters::Getters;
use derive_new::new;
use matchplay_rules::{Board, GameResult, Mark, MoveOutcome, Phase, RejectReason};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Slash commands understood by [`Action::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum Command {
    Start,
    Open,
    Join,
    Versus,
    Sessions,
    Score,
    Leaders,
    Nick,
    Forfeit,
}

/// What a participant asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Action {
    /// `/start`: show the menu.
    Start,
    /// `/open`: open a session and get its token.
    Open,
    /// `/join`: ask for a token to join with.
    Join,
    /// `/versus`: play the automated opponent.
    Versus,
    /// `/sessions`: list joinable sessions.
    Sessions,
    /// `/score`: own tallies.
    Score,
    /// `/leaders`: the leaderboard.
    Leaders,
    /// `/nick NAME`: set a nickname.
    Nick(String),
    /// `/forfeit`: abandon the current game.
    Forfeit,
    /// `turn ROW COL`: play a move.
    Turn {
        /// Zero-based row.
        row: usize,
        /// Zero-based column.
        col: usize,
    },
    /// Anything else.
    Text(String),
}

impl Action {
    /// Parses one line of client input. Unrecognised input is [`Action::Text`].
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let mut words = trimmed.split_whitespace();
        let Some(head) = words.next() else {
            return Action::Text(String::new());
        };

        if let Some(verb) = head.strip_prefix('/') {
            return match Command::from_str(verb) {
                Ok(Command::Start) => Action::Start,
                Ok(Command::Open) => Action::Open,
                Ok(Command::Join) => Action::Join,
                Ok(Command::Versus) => Action::Versus,
                Ok(Command::Sessions) => Action::Sessions,
                Ok(Command::Score) => Action::Score,
                Ok(Command::Leaders) => Action::Leaders,
                Ok(Command::Nick) => Action::Nick(words.collect::<Vec<_>>().join(" ")),
                Ok(Command::Forfeit) => Action::Forfeit,
                Err(_) => Action::Text(trimmed.to_string()),
            };
        }

        if head.eq_ignore_ascii_case("turn") {
            let coords: Vec<usize> = words.filter_map(|w| w.parse().ok()).collect();
            if let [row, col] = coords[..] {
                return Action::Turn { row, col };
            }
        }
        Action::Text(trimmed.to_string())
    }
}

/// One event from one participant.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct InboundEvent {
    from: ParticipantId,
    action: Action,
}

/// Content of an outbound notice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Reply to free text outside a game.
    Greeting,
    /// Available commands.
    Menu,
    /// A session was opened; share the token.
    SessionOpened {
        /// Token the opponent joins with.
        token: SessionToken,
    },
    /// Waiting for the participant to type a token.
    TokenPrompt,
    /// Token entry abandoned.
    JoinCancelled,
    /// No joinable session behind the typed token.
    SessionNotFound,
    /// Both participants are attached.
    GameStarted {
        /// Empty starting board.
        board: Board,
        /// Mark the recipient plays.
        mark: Mark,
        /// Whether the recipient moves first.
        your_turn: bool,
    },
    /// The recipient's move is awaited.
    YourTurn {
        /// Current board.
        board: Board,
    },
    /// The opponent's move is awaited.
    WaitForOpponent {
        /// Current board.
        board: Board,
    },
    /// A move was sent out of turn.
    NotYourTurn,
    /// The session still has only one participant.
    AwaitingSecondPlayer,
    /// A move was refused.
    MoveRejected {
        /// Why.
        reason: RejectReason,
    },
    /// Game won.
    YouWon {
        /// Final board.
        board: Board,
    },
    /// Game lost.
    YouLost {
        /// Final board.
        board: Board,
    },
    /// Game drawn.
    Draw {
        /// Final board.
        board: Board,
    },
    /// A game against the automated opponent began.
    VersusStarted {
        /// Empty starting board.
        board: Board,
    },
    /// Sessions waiting for a second participant.
    Joinable {
        /// Oldest first.
        sessions: Vec<JoinableSession>,
    },
    /// Own tallies.
    Score {
        /// Tallies.
        card: ScoreCard,
    },
    /// Best participants.
    Leaderboard {
        /// Best first.
        entries: Vec<LeaderEntry>,
    },
    /// Nickname stored.
    NicknameSet {
        /// The new nickname.
        nickname: String,
    },
    /// `/nick` without a name.
    NicknameMissing,
    /// The recipient abandoned their game.
    Forfeited,
    /// The opponent abandoned the game.
    OpponentForfeited,
    /// The opponent was evicted for inactivity.
    OpponentTimedOut,
    /// `/forfeit` or a move without a game.
    NotPlaying,
    /// The recipient already takes part in a session.
    AlreadyPlaying,
    /// Free text during a game.
    InGameHint,
    /// The game ended but its result could not be stored.
    ResultsNotSaved,
    /// The request could not be served.
    Failure {
        /// Error description.
        reason: String,
    },
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Greeting => write!(f, "Hi! Send /start to see what you can do."),
            Message::Menu => write!(
                f,
                "/open  open a game and get a token\n\
                 /join  join a game by token\n\
                 /sessions  list open games\n\
                 /versus  play the computer\n\
                 /score  your results\n\
                 /leaders  best players\n\
                 /nick NAME  set your nickname\n\
                 /forfeit  leave your game"
            ),
            Message::SessionOpened { token } => {
                write!(f, "Game opened. Your opponent joins with token {token}")
            }
            Message::TokenPrompt => write!(f, "Send the game token, or 'no' to cancel."),
            Message::JoinCancelled => write!(f, "Joining cancelled."),
            Message::SessionNotFound => write!(f, "Session not found."),
            Message::GameStarted {
                board,
                mark,
                your_turn,
            } => {
                let next = if *your_turn { "Your turn." } else { "Wait for your opponent." };
                write!(f, "Game started, you play {mark}. {next}\n{board}")
            }
            Message::YourTurn { board } => write!(f, "Your turn.\n{board}"),
            Message::WaitForOpponent { board } => write!(f, "Wait for your opponent.\n{board}"),
            Message::NotYourTurn => write!(f, "Wait for your turn."),
            Message::AwaitingSecondPlayer => write!(f, "Nobody has joined your game yet."),
            Message::MoveRejected { reason } => write!(f, "Move refused: {reason}."),
            Message::YouWon { board } => write!(f, "You won!\n{board}"),
            Message::YouLost { board } => write!(f, "You lost.\n{board}"),
            Message::Draw { board } => write!(f, "Draw.\n{board}"),
            Message::VersusStarted { board } => {
                write!(f, "You play X against the computer. Your turn.\n{board}")
            }
            Message::Joinable { sessions } if sessions.is_empty() => write!(f, "No open games."),
            Message::Joinable { sessions } => {
                write!(f, "Open games:")?;
                for session in sessions {
                    write!(f, "\n  {} by {}", session.token(), session.initiator())?;
                }
                Ok(())
            }
            Message::Score { card } => {
                write!(
                    f,
                    "Wins: {}, losses: {}, draws: {}",
                    card.wins(),
                    card.losses(),
                    card.draws()
                )?;
                write!(f, ", win rate: {}", card.win_rate_label())
            }
            Message::Leaderboard { entries } if entries.is_empty() => {
                write!(f, "No players yet.")
            }
            Message::Leaderboard { entries } => {
                write!(f, "Leaders:")?;
                for (place, entry) in entries.iter().enumerate() {
                    let rate = entry.card().win_rate_label();
                    write!(f, "\n  {}. {} {}", place + 1, entry.display_name(), rate)?;
                }
                Ok(())
            }
            Message::NicknameSet { nickname } => write!(f, "You are now {nickname}."),
            Message::NicknameMissing => write!(f, "Usage: /nick NAME"),
            Message::Forfeited => write!(f, "You left the game."),
            Message::OpponentForfeited => write!(f, "Your opponent left the game."),
            Message::OpponentTimedOut => write!(f, "Your opponent timed out. The game is over."),
            Message::NotPlaying => write!(f, "You are not in a game."),
            Message::AlreadyPlaying => write!(f, "You are already in a game."),
            Message::InGameHint => write!(f, "Send 'turn ROW COL' to move or /forfeit to leave."),
            Message::ResultsNotSaved => write!(f, "The result could not be saved."),
            Message::Failure { reason } => write!(f, "Something went wrong: {reason}"),
        }
    }
}

/// A message addressed to one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Getters, new)]
pub struct Notice {
    recipient: ParticipantId,
    message: Message,
}

/// Routes [`InboundEvent`]s to the tracker, registry and store.
#[derive(Clone)]
pub struct Dispatcher {
    tracker: PresenceTracker,
    registry: SessionRegistry,
    store: Arc<dyn ScoreStore>,
    predictor: SharedPredictor,
    leaderboard_size: usize,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tracker", &self.tracker)
            .field("registry", &self.registry)
            .field("leaderboard_size", &self.leaderboard_size)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher over shared state.
    pub fn new(
        tracker: PresenceTracker,
        registry: SessionRegistry,
        store: Arc<dyn ScoreStore>,
        predictor: SharedPredictor,
        leaderboard_size: usize,
    ) -> Self {
        Self {
            tracker,
            registry,
            store,
            predictor,
            leaderboard_size,
        }
    }

    /// Presence tracker in use.
    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    /// Session registry in use.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Handles one event and returns the notices to deliver.
    #[instrument(skip(self, event), fields(participant = %event.from, action = ?event.action))]
    pub async fn handle(&self, event: InboundEvent) -> Vec<Notice> {
        let from = &event.from;
        let status = match self.tracker.touch(from).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Presence lookup failed");
                return vec![failure(from, &e)];
            }
        };
        debug!(%status, "Dispatching");

        match (&event.action, status) {
            (Action::Score, _) => self.score(from).await,
            (Action::Leaders, _) => self.leaders(from).await,
            (Action::Nick(name), _) => self.nick(from, name).await,
            (Action::Sessions, _) => vec![Notice::new(
                from.clone(),
                Message::Joinable {
                    sessions: self.registry.list_joinable(),
                },
            )],
            (Action::Forfeit, _) => self.forfeit(from).await,
            (Action::Start, Status::Idle) => vec![Notice::new(from.clone(), Message::Menu)],
            (Action::Open, Status::Idle) => self.open(from),
            (Action::Join, Status::Idle) => {
                self.tracker.set_status(from, Status::AwaitingToken);
                vec![Notice::new(from.clone(), Message::TokenPrompt)]
            }
            (Action::Versus, Status::Idle) => self.versus(from),
            (Action::Text(_), Status::Idle) => vec![Notice::new(from.clone(), Message::Greeting)],
            (Action::Text(text), Status::AwaitingToken) => {
                if text.eq_ignore_ascii_case("no") {
                    self.tracker.set_status(from, Status::Idle);
                    vec![Notice::new(from.clone(), Message::JoinCancelled)]
                } else {
                    self.join(from, SessionToken::from(text.as_str()))
                }
            }
            (Action::Turn { row, col }, Status::InSession) => {
                self.human_turn(from, *row, *col).await
            }
            (Action::Turn { row, col }, Status::InAutomatedSession) => {
                self.versus_turn(from, *row, *col).await
            }
            (Action::Turn { .. }, _) => vec![Notice::new(from.clone(), Message::NotPlaying)],
            (_, Status::AwaitingToken) => vec![Notice::new(from.clone(), Message::TokenPrompt)],
            (_, Status::InSession | Status::InAutomatedSession) => {
                vec![Notice::new(from.clone(), Message::InGameHint)]
            }
        }
    }

    fn open(&self, from: &ParticipantId) -> Vec<Notice> {
        match self.registry.create_session(from) {
            Ok(token) => {
                self.tracker.set_status(from, Status::InSession);
                vec![Notice::new(from.clone(), Message::SessionOpened { token })]
            }
            Err(e) => vec![session_error(from, e)],
        }
    }

    fn join(&self, from: &ParticipantId, token: SessionToken) -> Vec<Notice> {
        match self.registry.join_session(&token, from) {
            Ok(snapshot) => {
                let first = snapshot.first().clone();
                self.tracker.set_status(&first, Status::InSession);
                self.tracker.set_status(from, Status::InSession);
                let board = snapshot.board().clone();
                vec![
                    Notice::new(
                        first,
                        Message::GameStarted {
                            board: board.clone(),
                            mark: Mark::First,
                            your_turn: true,
                        },
                    ),
                    Notice::new(
                        from.clone(),
                        Message::GameStarted {
                            board,
                            mark: Mark::Second,
                            your_turn: false,
                        },
                    ),
                ]
            }
            Err(e) => {
                info!(session_token = %token, error = %e, "Join failed");
                self.tracker.set_status(from, Status::Idle);
                vec![Notice::new(from.clone(), Message::SessionNotFound)]
            }
        }
    }

    fn versus(&self, from: &ParticipantId) -> Vec<Notice> {
        match self
            .registry
            .create_automated_session(from, Arc::clone(&self.predictor))
        {
            Ok(()) => {
                self.tracker.set_status(from, Status::InAutomatedSession);
                vec![Notice::new(
                    from.clone(),
                    Message::VersusStarted {
                        board: Board::new(),
                    },
                )]
            }
            Err(e) => vec![session_error(from, e)],
        }
    }

    async fn human_turn(&self, from: &ParticipantId, row: usize, col: usize) -> Vec<Notice> {
        let Some(SessionHandle::Human(session)) = self.registry.find_by_participant(from) else {
            self.tracker.set_status(from, Status::Idle);
            return vec![Notice::new(from.clone(), Message::NotPlaying)];
        };

        let (outcome, other, token) = {
            let mut session = relock(&session);
            match session.current_turn_identity() {
                Err(_) => return vec![Notice::new(from.clone(), Message::AwaitingSecondPlayer)],
                Ok(turn) if turn != from => {
                    return vec![Notice::new(from.clone(), Message::NotYourTurn)];
                }
                Ok(_) => {}
            }
            let outcome = session.play(from, row, col);
            (outcome, session.opponent_of(from).cloned(), session.token().clone())
        };
        let Some(other) = other else {
            return vec![Notice::new(from.clone(), Message::AwaitingSecondPlayer)];
        };

        let (board, result) = match outcome {
            // The session was torn down between lookup and lock.
            MoveOutcome::Rejected(RejectReason::NoSession) => {
                return vec![Notice::new(from.clone(), Message::NotPlaying)];
            }
            MoveOutcome::Rejected(reason) => {
                return vec![Notice::new(from.clone(), Message::MoveRejected { reason })];
            }
            MoveOutcome::Accepted { board, result } => (board, result),
        };

        if result == GameResult::Continue {
            return vec![
                Notice::new(from.clone(), Message::WaitForOpponent { board: board.clone() }),
                Notice::new(other, Message::YourTurn { board }),
            ];
        }

        // Removal closes the game, so a forfeit or sweep that got here first
        // already made this move fail. The result belongs to this move.
        if self.registry.remove_session(&token).is_none() {
            debug!(session_token = %token, "Finished session already removed");
        }
        self.tracker.set_status(from, Status::Idle);
        self.tracker.set_status(&other, Status::Idle);

        let (mut notices, saved) = match result {
            GameResult::Win(_) => {
                let saved = self.save(&[(from, Tally::Win), (&other, Tally::Loss)]).await;
                (
                    vec![
                        Notice::new(from.clone(), Message::YouWon { board: board.clone() }),
                        Notice::new(other.clone(), Message::YouLost { board }),
                    ],
                    saved,
                )
            }
            _ => {
                let saved = self.save(&[(from, Tally::Draw), (&other, Tally::Draw)]).await;
                (
                    vec![
                        Notice::new(from.clone(), Message::Draw { board: board.clone() }),
                        Notice::new(other.clone(), Message::Draw { board }),
                    ],
                    saved,
                )
            }
        };
        if !saved {
            notices.push(Notice::new(from.clone(), Message::ResultsNotSaved));
            notices.push(Notice::new(other, Message::ResultsNotSaved));
        }
        notices
    }

    async fn versus_turn(&self, from: &ParticipantId, row: usize, col: usize) -> Vec<Notice> {
        let Some(SessionHandle::Automated(session)) = self.registry.find_by_participant(from)
        else {
            self.tracker.set_status(from, Status::Idle);
            return vec![Notice::new(from.clone(), Message::NotPlaying)];
        };

        let outcome = relock(&session).play(row, col);
        let (board, result) = match outcome {
            VersusOutcome::Rejected(RejectReason::NoSession) => {
                return vec![Notice::new(from.clone(), Message::NotPlaying)];
            }
            VersusOutcome::Rejected(reason) => {
                return vec![Notice::new(from.clone(), Message::MoveRejected { reason })];
            }
            VersusOutcome::Accepted { board, result, .. } => (board, result),
        };

        let (message, tally) = match result {
            VersusResult::Continue => {
                return vec![Notice::new(from.clone(), Message::YourTurn { board })];
            }
            VersusResult::Win => (Message::YouWon { board }, Tally::Win),
            VersusResult::OpponentWin => (Message::YouLost { board }, Tally::Loss),
            VersusResult::Draw => (Message::Draw { board }, Tally::Draw),
        };

        if self.registry.remove_automated_session(from).is_none() {
            debug!("Finished automated session already removed");
        }
        self.tracker.set_status(from, Status::Idle);
        let mut notices = vec![Notice::new(from.clone(), message)];
        if !self.save(&[(from, tally)]).await {
            notices.push(Notice::new(from.clone(), Message::ResultsNotSaved));
        }
        notices
    }

    async fn forfeit(&self, from: &ParticipantId) -> Vec<Notice> {
        let removed = self
            .registry
            .remove_for_participant(from)
            .filter(|removed| removed.phase() != Phase::Finished);
        self.tracker.set_status(from, Status::Idle);
        let Some(removed) = removed else {
            return vec![Notice::new(from.clone(), Message::NotPlaying)];
        };
        info!(phase = %removed.phase(), "Participant forfeited");

        let mut notices = vec![Notice::new(from.clone(), Message::Forfeited)];
        let partner = removed.partner_of(from).cloned();
        if let Some(partner) = &partner {
            self.tracker.set_status(partner, Status::Idle);
            notices.push(Notice::new(partner.clone(), Message::OpponentForfeited));
        }

        if removed.phase() == Phase::InProgress {
            let mut tallies = vec![(from, Tally::Loss)];
            if let Some(partner) = &partner {
                tallies.push((partner, Tally::Win));
            }
            if !self.save(&tallies).await {
                notices.push(Notice::new(from.clone(), Message::ResultsNotSaved));
            }
        }
        notices
    }

    async fn score(&self, from: &ParticipantId) -> Vec<Notice> {
        match self.store.score(from).await {
            Ok(card) => vec![Notice::new(
                from.clone(),
                Message::Score {
                    card: card.unwrap_or_default(),
                },
            )],
            Err(e) => vec![failure(from, &e)],
        }
    }

    async fn leaders(&self, from: &ParticipantId) -> Vec<Notice> {
        match self.store.leaders(self.leaderboard_size).await {
            Ok(entries) => vec![Notice::new(from.clone(), Message::Leaderboard { entries })],
            Err(e) => vec![failure(from, &e)],
        }
    }

    async fn nick(&self, from: &ParticipantId, name: &str) -> Vec<Notice> {
        let name = name.trim();
        if name.is_empty() {
            return vec![Notice::new(from.clone(), Message::NicknameMissing)];
        }
        match self.store.set_nickname(from, name).await {
            Ok(()) => vec![Notice::new(
                from.clone(),
                Message::NicknameSet {
                    nickname: name.to_string(),
                },
            )],
            Err(e) => vec![failure(from, &e)],
        }
    }

    /// Records results after the in-memory state is already settled.
    /// Returns `false` if any write failed.
    async fn save(&self, tallies: &[(&ParticipantId, Tally)]) -> bool {
        let mut saved = true;
        for (id, tally) in tallies {
            let written = match tally {
                Tally::Win => self.store.record_win(id).await,
                Tally::Loss => self.store.record_loss(id).await,
                Tally::Draw => self.store.record_draw(id).await,
            };
            if let Err(e) = written {
                warn!(participant = %id, error = %e, "Result not saved");
                saved = false;
            }
        }
        saved
    }
}

#[derive(Debug, Clone, Copy)]
enum Tally {
    Win,
    Loss,
    Draw,
}

fn failure(to: &ParticipantId, error: &StoreError) -> Notice {
    Notice::new(
        to.clone(),
        Message::Failure {
            reason: error.kind.to_string(),
        },
    )
}

fn session_error(to: &ParticipantId, error: SessionError) -> Notice {
    let message = match error {
        SessionError::AlreadyInSession => Message::AlreadyPlaying,
        SessionError::NotFound => Message::SessionNotFound,
        other => Message::Failure {
            reason: other.to_string(),
        },
    };
    Notice::new(to.clone(), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Action::parse("/open"), Action::Open);
        assert_eq!(Action::parse("  /JOIN "), Action::Join);
        assert_eq!(Action::parse("/nick Big Al"), Action::Nick("Big Al".into()));
        assert_eq!(Action::parse("turn 1 2"), Action::Turn { row: 1, col: 2 });
    }

    #[test]
    fn test_parse_falls_back_to_text() {
        assert_eq!(Action::parse("/dance"), Action::Text("/dance".into()));
        assert_eq!(Action::parse("turn 1"), Action::Text("turn 1".into()));
        assert_eq!(Action::parse(" 1700000000 "), Action::Text("1700000000".into()));
        assert_eq!(Action::parse(""), Action::Text(String::new()));
    }

    #[test]
    fn test_score_message_marks_undefined_rate() {
        let message = Message::Score {
            card: ScoreCard::new(0, 0, 2, None),
        };
        assert_eq!(message.to_string(), "Wins: 0, losses: 0, draws: 2, win rate: n/a");
    }
}
