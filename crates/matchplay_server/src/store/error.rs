//! Score store error type.

use derive_more::{Display, Error};
use diesel::result::DatabaseErrorKind;
use tracing::instrument;

/// What part of a store call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StoreErrorKind {
    /// The database file could not be opened.
    #[display("score database unreachable")]
    Connect,
    /// Schema migrations did not apply.
    #[display("score database schema out of date")]
    Migrate,
    /// Another writer holds the database.
    #[display("score database busy")]
    Busy,
    /// A statement failed.
    #[display("score query failed")]
    Query,
    /// The blocking task running the call died.
    #[display("score task aborted")]
    Task,
}

impl StoreErrorKind {
    /// Whether the same call may succeed if simply repeated.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Busy | Self::Task)
    }
}

/// Store failure with its kind and the location it was raised at.
///
/// `message` carries the underlying detail (paths, SQL errors) for logs.
/// Participants are only shown the kind.
#[derive(Debug, Clone, Display, Error)]
#[display("{}: {} at {}:{}", kind, message, file, line)]
pub struct StoreError {
    /// Failure category.
    pub kind: StoreErrorKind,
    /// Underlying detail.
    pub message: String,
    /// Line number where the error occurred.
    pub line: u32,
    /// Source file where the error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a store error of `kind` with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Whether retrying the call may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl From<diesel::result::Error> for StoreError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        let kind = match &err {
            // SQLite reports SQLITE_BUSY without a dedicated diesel kind.
            diesel::result::Error::DatabaseError(DatabaseErrorKind::Unknown, info)
                if info.message().contains("locked") || info.message().contains("busy") =>
            {
                StoreErrorKind::Busy
            }
            _ => StoreErrorKind::Query,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<diesel::ConnectionError> for StoreError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(StoreErrorKind::Connect, err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> Self {
        Self::new(StoreErrorKind::Task, err.to_string())
    }
}
