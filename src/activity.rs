//! Last user activity tracking.

use std::time::{Duration, Instant};

/// Timestamp of the most recent user interaction.
///
/// The timestamp never moves backwards, even if a caller passes an older
/// instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityClock {
    last: Instant,
}

impl ActivityClock {
    /// Start the clock with `now` as the last activity.
    pub fn new(now: Instant) -> Self {
        Self { last: now }
    }

    /// Record activity at `now`.
    pub fn touch(&mut self, now: Instant) {
        if now > self.last {
            self.last = now;
        }
    }

    /// The most recent activity.
    pub fn last(&self) -> Instant {
        self.last
    }

    /// Time elapsed since the most recent activity.
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last)
    }
}
