//! Per-participant status and activity bookkeeping.

use crate::ParticipantId;
use crate::store::{ScoreStore, StoreError};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Coarse conversational state of a participant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    /// Not in any game.
    #[default]
    Idle,
    /// Asked to join and waiting for a token.
    AwaitingToken,
    /// Opened or joined a human-vs-human session.
    InSession,
    /// Playing the automated opponent.
    InAutomatedSession,
}

/// What the tracker knows about one participant.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct PresenceRecord {
    identity: ParticipantId,
    status: Status,
    last_activity: Instant,
}

/// Status and last-activity map, shared between request handlers and the
/// idle reaper.
///
/// Every operation runs under one lock held for its whole read-decide-write
/// sequence. The lock is never held across a store call.
#[derive(Clone)]
pub struct PresenceTracker {
    records: Arc<Mutex<HashMap<ParticipantId, PresenceRecord>>>,
    store: Arc<dyn ScoreStore>,
}

impl fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}

impl PresenceTracker {
    /// Creates an empty tracker that hydrates unknown identities from `store`.
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ParticipantId, PresenceRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records activity for `identity` and returns its status.
    ///
    /// The first event from an unknown identity checks the store and
    /// creates a persistent record if none exists, then starts tracking the
    /// identity as [`Status::Idle`]. Later events stay in memory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached. No record is
    /// created in that case.
    #[instrument(skip(self), fields(participant = %identity))]
    pub async fn touch(&self, identity: &ParticipantId) -> Result<Status, StoreError> {
        if let Some(status) = self.refresh(identity) {
            return Ok(status);
        }

        if !self.store.identity_exists(identity).await? {
            self.store.create_identity(identity).await?;
        }

        let now = Instant::now();
        let mut records = self.lock();
        // A concurrent touch may have inserted meanwhile; keep its status.
        let record = records
            .entry(identity.clone())
            .or_insert_with(|| PresenceRecord {
                identity: identity.clone(),
                status: Status::Idle,
                last_activity: now,
            });
        record.last_activity = now;
        info!(status = %record.status, "Participant now tracked");
        Ok(record.status)
    }

    fn refresh(&self, identity: &ParticipantId) -> Option<Status> {
        let mut records = self.lock();
        let record = records.get_mut(identity)?;
        record.last_activity = Instant::now();
        Some(record.status)
    }

    /// Sets the status of a tracked identity. Returns `false` if the
    /// identity is not tracked.
    #[instrument(skip(self), fields(participant = %identity))]
    pub fn set_status(&self, identity: &ParticipantId, status: Status) -> bool {
        match self.lock().get_mut(identity) {
            Some(record) => {
                debug!(from = %record.status, to = %status, "Status changed");
                record.status = status;
                true
            }
            None => false,
        }
    }

    /// Current status, if tracked.
    pub fn status(&self, identity: &ParticipantId) -> Option<Status> {
        self.lock().get(identity).map(|r| r.status)
    }

    /// Last recorded activity, if tracked.
    pub fn last_activity(&self, identity: &ParticipantId) -> Option<Instant> {
        self.lock().get(identity).map(|r| r.last_activity)
    }

    /// Removes the record iff it has been idle for strictly longer than
    /// `threshold` at `now`.
    #[instrument(skip(self, now), fields(participant = %identity))]
    pub fn evict_if_idle(&self, identity: &ParticipantId, now: Instant, threshold: Duration) -> bool {
        let mut records = self.lock();
        let idle = records
            .get(identity)
            .is_some_and(|r| now.saturating_duration_since(r.last_activity) > threshold);
        if idle {
            records.remove(identity);
            info!("Evicted idle participant");
        }
        idle
    }

    /// Identities idle for strictly longer than `threshold` at `now`.
    ///
    /// A snapshot only: callers re-check with [`evict_if_idle`](Self::evict_if_idle).
    pub fn idle_candidates(&self, now: Instant, threshold: Duration) -> Vec<ParticipantId> {
        self.lock()
            .values()
            .filter(|r| now.saturating_duration_since(r.last_activity) > threshold)
            .map(|r| r.identity.clone())
            .collect()
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nobody is tracked.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
