//! Fixed-window counting record.

use std::time::Duration;
use tokio::time::Instant;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// The request is within budget and may proceed.
    Allowed,
    /// The client has exhausted its budget for the current window.
    Denied,
}

impl Decision {
    /// Returns `true` for [`Decision::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Request count for one client within its current window.
///
/// The record itself is not synchronized; the store guarantees a single
/// writer per identity while [`WindowCounter::hit`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    /// Requests seen in the current window, saturating at `max + 1`
    count: u64,
    /// When the current window started
    window_start: Instant,
}

impl WindowCounter {
    /// Open a fresh window at `now`, counting the request that opened it.
    pub fn started_at(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }

    /// Count one request at `now` and decide whether it is within `max`.
    ///
    /// A stale window is replaced by a fresh one before counting, so the
    /// first request after expiry is always allowed.
    pub fn hit(&mut self, now: Instant, window: Duration, max: u64) -> Decision {
        if self.is_stale(now, window) {
            *self = Self::started_at(now);
            return Decision::Allowed;
        }

        // Denied requests stop advancing the count once it passes the limit.
        if self.count <= max {
            self.count += 1;
        }

        if self.count <= max {
            Decision::Allowed
        } else {
            Decision::Denied
        }
    }

    /// Whether the window has ended at `now`. The boundary itself is stale.
    pub fn is_stale(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }

    /// Whether the record has been stale for longer than `retention`.
    pub fn is_idle(&self, now: Instant, window: Duration, retention: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window.saturating_add(retention)
    }

    /// Get the current count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Get the start of the current window.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Get the duration until the current window resets.
    pub fn duration_until_reset(&self, now: Instant, window: Duration) -> Duration {
        let elapsed = now.saturating_duration_since(self.window_start);
        window.saturating_sub(elapsed)
    }
}
