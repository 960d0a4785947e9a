//! Persistent per-participant tallies.
//!
//! The session layer only needs to know whether an identity exists and to
//! bump win/loss/draw counters. Everything here is reached through the
//! [`ScoreStore`] trait so request handling never touches a connection
//! directly.

mod error;
mod memory;
mod models;
mod schema;
mod sqlite;

pub use error::{StoreError, StoreErrorKind};
pub use memory::MemoryScoreStore;
pub(crate) use models::{NewPlayer, PlayerRecord};
pub use sqlite::SqliteScoreStore;

use crate::ParticipantId;
use async_trait::async_trait;
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Win/loss/draw tallies for one participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct ScoreCard {
    wins: u32,
    losses: u32,
    draws: u32,
    nickname: Option<String>,
}

impl ScoreCard {
    /// Wins over decisive games, or `None` before the first decisive game.
    pub fn win_rate(&self) -> Option<f64> {
        let decisive = self.wins + self.losses;
        (decisive > 0).then(|| f64::from(self.wins) / f64::from(decisive))
    }

    /// Win rate as a whole percentage, or `n/a` when undefined.
    pub fn win_rate_label(&self) -> String {
        match self.win_rate() {
            Some(rate) => format!("{:.0}%", rate * 100.0),
            None => "n/a".to_string(),
        }
    }

    /// Games recorded in total.
    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, new)]
pub struct LeaderEntry {
    participant: ParticipantId,
    card: ScoreCard,
}

impl LeaderEntry {
    /// Nickname if set, else the raw identity.
    pub fn display_name(&self) -> String {
        self.card
            .nickname()
            .clone()
            .unwrap_or_else(|| self.participant.to_string())
    }
}

/// Orders entries best first and keeps the top `limit`.
///
/// Participants without a decisive game have no win rate and rank below
/// everyone who has one. Ties go to more wins, then more draws, then to
/// the identity for a stable order.
pub(crate) fn rank_leaders(mut entries: Vec<LeaderEntry>, limit: usize) -> Vec<LeaderEntry> {
    entries.sort_by(|a, b| {
        let by_rate = match (a.card.win_rate(), b.card.win_rate()) {
            (Some(rate_a), Some(rate_b)) => rate_b.partial_cmp(&rate_a).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_rate
            .then_with(|| b.card.wins.cmp(&a.card.wins))
            .then_with(|| b.card.draws.cmp(&a.card.draws))
            .then_with(|| a.participant.cmp(&b.participant))
    });
    entries.truncate(limit);
    entries
}

/// Persistence collaborator for participant records and results.
///
/// Implementations must be callable from many tasks at once. None of the
/// in-memory structures hold a lock while awaiting these methods.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Whether a record exists for `id`.
    async fn identity_exists(&self, id: &ParticipantId) -> Result<bool, StoreError>;

    /// Creates an empty record for `id`. Creating an existing record is a
    /// no-op.
    async fn create_identity(&self, id: &ParticipantId) -> Result<(), StoreError>;

    /// Adds one win.
    async fn record_win(&self, id: &ParticipantId) -> Result<(), StoreError>;

    /// Adds one loss.
    async fn record_loss(&self, id: &ParticipantId) -> Result<(), StoreError>;

    /// Adds one draw.
    async fn record_draw(&self, id: &ParticipantId) -> Result<(), StoreError>;

    /// Current tallies, or `None` for an unknown identity.
    async fn score(&self, id: &ParticipantId) -> Result<Option<ScoreCard>, StoreError>;

    /// Sets the display nickname.
    async fn set_nickname(&self, id: &ParticipantId, nickname: &str) -> Result<(), StoreError>;

    /// Best participants by win rate, at most `limit`.
    async fn leaders(&self, limit: usize) -> Result<Vec<LeaderEntry>, StoreError>;
}
