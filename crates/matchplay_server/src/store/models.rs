//! Row types for the `players` table.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;

use crate::store::{ScoreCard, schema};

/// Stored player row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::players)]
pub struct PlayerRecord {
    id: String,
    nickname: Option<String>,
    wins: i32,
    losses: i32,
    draws: i32,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl PlayerRecord {
    /// Tallies as a [`ScoreCard`].
    pub fn score_card(&self) -> ScoreCard {
        ScoreCard::new(
            self.wins.max(0) as u32,
            self.losses.max(0) as u32,
            self.draws.max(0) as u32,
            self.nickname.clone(),
        )
    }
}

/// Insertable row for a newly seen participant.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::players)]
pub struct NewPlayer {
    id: String,
}
