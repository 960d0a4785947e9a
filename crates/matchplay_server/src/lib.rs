//! Matchplay server library - sessions, presence and idle eviction
//!
//! This library pairs remote participants into tic-tac-toe sessions and
//! arbitrates their moves with [`matchplay_rules`].
//!
//! # Architecture
//!
//! - **Registry**: active human and automated sessions, by token and identity
//! - **Presence**: per-participant status and last activity
//! - **Reaper**: background eviction of idle participants
//! - **Dispatch**: inbound events to registry/tracker calls and notices
//! - **Store**: persistent win/loss/draw tallies (SQLite or memory)
//!
//! # Example
//!
//! ```no_run
//! use matchplay_server::{
//!     Action, Dispatcher, InboundEvent, MemoryScoreStore, PredictorKind, PresenceTracker,
//!     SessionRegistry,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let store = Arc::new(MemoryScoreStore::new());
//! let tracker = PresenceTracker::new(store.clone());
//! let dispatcher = Dispatcher::new(
//!     tracker,
//!     SessionRegistry::new(),
//!     store,
//!     PredictorKind::LineSeeker.build(),
//!     5,
//! );
//!
//! let notices = dispatcher
//!     .handle(InboundEvent::new("alice".into(), Action::parse("/open")))
//!     .await;
//! println!("{}", notices[0].message());
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod console;
mod dispatch;
mod error;
mod identity;
mod presence;
mod predictor;
mod reaper;
mod registry;
mod session;
mod store;
mod versus;

// Crate-level exports - Configuration
pub use config::{ConfigError, DATABASE_PATH_ENV, DEFAULT_CONFIG_FILE, IDLE_TIMEOUT_ENV, ServerConfig};

// Crate-level exports - Identities and errors
pub use error::SessionError;
pub use identity::{ParticipantId, SessionToken};

// Crate-level exports - Sessions
pub use registry::{JoinableSession, RemovedSession, SessionHandle, SessionRegistry, relock};
pub use session::{Participant, Session, SessionSnapshot};
pub use versus::{AutomatedOpponentSession, HUMAN_MARK, OPPONENT_MARK, VersusOutcome, VersusResult};

// Crate-level exports - Automated opponent
pub use predictor::{FirstEmpty, LineSeeker, MovePredictor, PredictorKind, SharedPredictor, first_empty};

// Crate-level exports - Presence and eviction
pub use presence::{PresenceRecord, PresenceTracker, Status};
pub use reaper::{IdleReaper, MIN_SWEEP_INTERVAL, Reaped};

// Crate-level exports - Persistence
pub use store::{
    LeaderEntry, MemoryScoreStore, ScoreCard, ScoreStore, SqliteScoreStore, StoreError, StoreErrorKind,
};

// Crate-level exports - Dispatch and transport
pub use console::{Console, OutputFormat, parse_line, render};
pub use dispatch::{Action, Dispatcher, InboundEvent, Message, Notice};
