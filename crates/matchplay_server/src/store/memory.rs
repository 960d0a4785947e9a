//! In-process score store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, instrument};

use crate::ParticipantId;
use crate::store::{LeaderEntry, ScoreCard, ScoreStore, StoreError, rank_leaders};

/// Score store that keeps everything in a map.
///
/// Used by tests and by `console --memory`. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryScoreStore {
    cards: Arc<Mutex<HashMap<ParticipantId, ScoreCard>>>,
}

impl MemoryScoreStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of participants on record.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no participant is on record.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ParticipantId, ScoreCard>> {
        self.cards.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, id: &ParticipantId, apply: impl FnOnce(&mut ScoreCard)) {
        let mut cards = self.lock();
        let card = cards.entry(id.clone()).or_default();
        apply(card);
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn identity_exists(&self, id: &ParticipantId) -> Result<bool, StoreError> {
        Ok(self.lock().contains_key(id))
    }

    #[instrument(skip(self, id), fields(participant = %id))]
    async fn create_identity(&self, id: &ParticipantId) -> Result<(), StoreError> {
        self.lock().entry(id.clone()).or_default();
        debug!("Participant record created");
        Ok(())
    }

    async fn record_win(&self, id: &ParticipantId) -> Result<(), StoreError> {
        self.update(id, |card| card.wins += 1);
        Ok(())
    }

    async fn record_loss(&self, id: &ParticipantId) -> Result<(), StoreError> {
        self.update(id, |card| card.losses += 1);
        Ok(())
    }

    async fn record_draw(&self, id: &ParticipantId) -> Result<(), StoreError> {
        self.update(id, |card| card.draws += 1);
        Ok(())
    }

    async fn score(&self, id: &ParticipantId) -> Result<Option<ScoreCard>, StoreError> {
        Ok(self.lock().get(id).cloned())
    }

    async fn set_nickname(&self, id: &ParticipantId, nickname: &str) -> Result<(), StoreError> {
        let nickname = nickname.to_string();
        self.update(id, |card| card.nickname = Some(nickname));
        Ok(())
    }

    async fn leaders(&self, limit: usize) -> Result<Vec<LeaderEntry>, StoreError> {
        let entries = self
            .lock()
            .iter()
            .map(|(id, card)| LeaderEntry::new(id.clone(), card.clone()))
            .collect();
        Ok(rank_leaders(entries, limit))
    }
}
