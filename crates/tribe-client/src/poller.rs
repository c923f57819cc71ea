//! Update poller state machine.
//!
//! The scheduling decisions live in [`PollerState`], which is driven one
//! tick at a time and never touches a timer itself.  The sync store owns
//! the tokio task that sleeps for whatever `on_tick` returns.

use std::time::Duration;

use serde::Serialize;

use tribe_shared::constants::{
    DEFAULT_POLL_INTERVAL_MS, MAX_POLL_BACKOFF_MS, MAX_POLL_RETRIES, SLOW_POLL_INTERVAL_MS,
};
use tribe_shared::{ChatSnapshot, Message, Participant};

use crate::directory::latest_participant_update;
use crate::merge::latest_message_time;

/// Tunables for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay while updates keep arriving.
    pub interval: Duration,
    /// Delay after a tick that brought nothing.
    pub slow_interval: Duration,
    /// Ceiling for the failure backoff.
    pub max_backoff: Duration,
    /// Consecutive failures tolerated before the poller gives up.
    pub max_retries: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            slow_interval: Duration::from_millis(SLOW_POLL_INTERVAL_MS),
            max_backoff: Duration::from_millis(MAX_POLL_BACKOFF_MS),
            max_retries: MAX_POLL_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum PollPhase {
    Idle,
    Polling {
        #[serde(rename = "intervalMs", serialize_with = "as_millis")]
        interval: Duration,
    },
    Stopped,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// What a single poll tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// At least one message or participant update arrived.
    Updated,
    /// Both update feeds came back empty.
    Empty,
    /// A fetch failed.
    Failed,
}

#[derive(Debug, Clone)]
pub struct PollerState {
    settings: PollSettings,
    phase: PollPhase,
    retries: u32,
}

impl PollerState {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            settings,
            phase: PollPhase::Idle,
            retries: 0,
        }
    }

    /// Enter `Polling` with a clean slate.  Returns the first delay.
    pub fn start(&mut self) -> Duration {
        self.retries = 0;
        self.phase = PollPhase::Polling {
            interval: self.settings.interval,
        };
        self.settings.interval
    }

    /// Record a tick and decide the next delay.  `None` means stop.
    pub fn on_tick(&mut self, outcome: TickOutcome) -> Option<Duration> {
        if self.phase == PollPhase::Stopped {
            return None;
        }

        let next = match outcome {
            TickOutcome::Updated => {
                self.retries = 0;
                self.settings.interval
            }
            // Only an update clears the failure count.
            TickOutcome::Empty => self.settings.slow_interval,
            TickOutcome::Failed => {
                self.retries += 1;
                if self.retries > self.settings.max_retries {
                    self.phase = PollPhase::Stopped;
                    return None;
                }
                self.backoff()
            }
        };

        self.phase = PollPhase::Polling { interval: next };
        Some(next)
    }

    pub fn stop(&mut self) {
        self.phase = PollPhase::Stopped;
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    fn backoff(&self) -> Duration {
        let factor = 2u32.checked_pow(self.retries).unwrap_or(u32::MAX);
        self.settings
            .interval
            .checked_mul(factor)
            .map_or(self.settings.max_backoff, |d| d.min(self.settings.max_backoff))
    }
}

/// The `since` cursors for the two update feeds, epoch millis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermarks {
    pub messages: i64,
    pub participants: i64,
}

impl Watermarks {
    pub fn from_snapshot(snapshot: &ChatSnapshot) -> Self {
        Self {
            messages: latest_message_time(&snapshot.messages).unwrap_or(0),
            participants: latest_participant_update(&snapshot.participants).unwrap_or(0),
        }
    }

    /// Move each cursor forward to the newest timestamp in a batch.  Never
    /// moves backwards.
    pub fn advance(&mut self, messages: &[Message], participants: &[Participant]) {
        if let Some(t) = messages.iter().map(Message::effective_time).max() {
            self.messages = self.messages.max(t);
        }
        if let Some(t) = latest_participant_update(participants) {
            self.participants = self.participants.max(t);
        }
    }
}
