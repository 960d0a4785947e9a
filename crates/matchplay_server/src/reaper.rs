//! Background eviction of idle participants.

use crate::dispatch::{Message, Notice};
use crate::registry::RemovedSession;
use crate::{ParticipantId, PresenceTracker, SessionRegistry, Status};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Shortest sweep period. Smaller requests, zero included, are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

fn clamp_interval(interval: Duration) -> Duration {
    if interval < MIN_SWEEP_INTERVAL {
        warn!(
            requested_ms = interval.as_millis() as u64,
            "Sweep interval below minimum, clamping"
        );
        return MIN_SWEEP_INTERVAL;
    }
    interval
}

/// One participant evicted by a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaped {
    /// The evicted participant.
    pub participant: ParticipantId,
    /// The session torn down with them, if any.
    pub session: Option<RemovedSession>,
}

/// Periodically evicts participants idle beyond a threshold, together with
/// any session they hold.
///
/// Runs beside request handling on the same tracker and registry. A
/// surviving partner is reset to [`Status::Idle`] and, when a notice channel
/// is configured, told that the opponent timed out.
#[derive(Debug, Clone)]
pub struct IdleReaper {
    tracker: PresenceTracker,
    registry: SessionRegistry,
    threshold: Duration,
    interval: Duration,
    notices: Option<mpsc::Sender<Notice>>,
}

impl IdleReaper {
    /// Reaper sweeping every `threshold`, but no more often than
    /// [`MIN_SWEEP_INTERVAL`].
    pub fn new(tracker: PresenceTracker, registry: SessionRegistry, threshold: Duration) -> Self {
        Self {
            tracker,
            registry,
            threshold,
            interval: clamp_interval(threshold),
            notices: None,
        }
    }

    /// Sweeps every `interval` instead of every threshold.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = clamp_interval(interval);
        self
    }

    /// Sends timeout notices to surviving partners on `notices`.
    pub fn with_notices(mut self, notices: mpsc::Sender<Notice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Idle threshold.
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Time between sweeps.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one sweep as of `now`.
    ///
    /// Each candidate is re-checked and evicted atomically before its session
    /// is removed, so a participant who became active since the snapshot
    /// keeps both record and session.
    #[instrument(skip(self, now))]
    pub fn sweep(&self, now: Instant) -> Vec<Reaped> {
        let mut reaped = Vec::new();
        for participant in self.tracker.idle_candidates(now, self.threshold) {
            if !self.tracker.evict_if_idle(&participant, now, self.threshold) {
                debug!(participant = %participant, "Active again, skipped");
                continue;
            }

            let session = self.registry.remove_for_participant(&participant);
            if let Some(partner) = session.as_ref().and_then(|s| s.partner_of(&participant)) {
                self.tracker.set_status(partner, Status::Idle);
                self.notify(partner);
            }
            reaped.push(Reaped {
                participant,
                session,
            });
        }

        if !reaped.is_empty() {
            info!(
                count = reaped.len(),
                sessions = self.registry.session_count(),
                automated = self.registry.automated_count(),
                "Idle participants evicted"
            );
        }
        reaped
    }

    fn notify(&self, partner: &ParticipantId) {
        let Some(notices) = &self.notices else {
            return;
        };
        // Delivery is best effort.
        if let Err(e) = notices.try_send(Notice::new(partner.clone(), Message::OpponentTimedOut)) {
            warn!(participant = %partner, error = %e, "Timeout notice dropped");
        }
    }

    /// Sweeps on the configured interval until `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            info!(
                threshold_secs = self.threshold.as_secs(),
                interval_secs = self.interval.as_secs(),
                "Idle reaper started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Idle reaper shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        self.sweep(Instant::now());
                    }
                }
            }
        })
    }
}
