//! The single pending timer of a game instance and the state-entry clock.

use crate::effects::EffectList;
use log::debug;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// A scheduled, not yet fired, list of effects.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTimer {
    /// Increases with every `start`; lets owners tell timers apart.
    pub id: u64,
    pub duration: Duration,
    pub effects: EffectList,
    /// `payload` of the action that scheduled the timer, bound again when
    /// the effects run.
    pub payload: Value,
    pub scheduled_at: Instant,
}

impl PendingTimer {
    pub fn deadline(&self) -> Instant {
        self.scheduled_at + self.duration
    }
}

/// Tracks when the current state was entered and holds at most one
/// pending timer.
///
/// The timer never fires by itself: the owner asks for [`Self::deadline`],
/// sleeps until then and calls [`Self::take_due`]. A cancelled or replaced
/// timer is simply gone, so it cannot be taken afterwards.
#[derive(Debug)]
pub struct StateTimer {
    entered_at: Instant,
    pending: Option<PendingTimer>,
    next_id: u64,
}

impl StateTimer {
    pub fn new(now: Instant) -> Self {
        Self {
            entered_at: now,
            pending: None,
            next_id: 1,
        }
    }

    /// Resets the elapsed-time origin and cancels the pending timer,
    /// returning it.
    pub fn on_state_enter(&mut self, now: Instant) -> Option<PendingTimer> {
        self.entered_at = now;
        let cancelled = self.pending.take();
        if let Some(timer) = &cancelled {
            debug!("Timer {} cancelled by state change", timer.id);
        }
        cancelled
    }

    /// Schedules `effects` to run `duration` after `now`, replacing any
    /// pending timer.
    pub fn start(
        &mut self,
        duration: Duration,
        effects: EffectList,
        payload: Value,
        now: Instant,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if let Some(previous) = self.pending.replace(PendingTimer {
            id,
            duration,
            effects,
            payload,
            scheduled_at: now,
        }) {
            debug!("Timer {} replaced by timer {id}", previous.id);
        }
        id
    }

    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.entered_at)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(PendingTimer::deadline)
    }

    /// Removes and returns the pending timer if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<PendingTimer> {
        if self.deadline().is_some_and(|deadline| deadline <= now) {
            self.pending.take()
        } else {
            None
        }
    }

    pub fn pending(&self) -> Option<&PendingTimer> {
        self.pending.as_ref()
    }
}
