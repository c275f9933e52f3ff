//! Concurrent per-client window counter store.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::counter::{Decision, WindowCounter};
use super::identity::ClientIdentity;
use crate::error::{ReqlimitError, Result};

/// Limits enforced by a [`WindowCounterStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    /// Maximum requests admitted per client per window
    pub max_requests: u64,
    /// Length of one counting window
    pub window: Duration,
    /// How long a record may stay stale before idle reclamation removes it
    pub retention: Duration,
    /// Period of the background reclamation pass, `None` to disable it
    pub reclaim_interval: Option<Duration>,
}

impl LimitConfig {
    /// Create limits of `max_requests` per `window`.
    ///
    /// Retention and the reclamation period both default to one window.
    pub fn new(max_requests: u64, window: Duration) -> Result<Self> {
        if max_requests == 0 {
            return Err(ReqlimitError::InvalidLimit(
                "max_requests must be greater than zero".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(ReqlimitError::InvalidLimit(
                "window must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            max_requests,
            window,
            retention: window,
            reclaim_interval: Some(window),
        })
    }

    /// Set how long stale records are retained before reclamation.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the background reclamation period, or disable it with `None`.
    pub fn with_reclaim_interval(mut self, interval: Option<Duration>) -> Self {
        self.reclaim_interval = interval.filter(|i| !i.is_zero());
        self
    }
}

/// Per-client fixed-window counters.
///
/// Records live in a sharded map. An admission check holds the write lock of
/// the shard owning the identity for the whole read-increment-compare step,
/// so checks for one identity are linearized while unrelated identities
/// rarely contend.
pub struct WindowCounterStore {
    /// Counting records indexed by client identity
    records: DashMap<ClientIdentity, WindowCounter>,
    limits: LimitConfig,
}

impl WindowCounterStore {
    /// Create an empty store enforcing `limits`.
    pub fn new(limits: LimitConfig) -> Self {
        Self {
            records: DashMap::new(),
            limits,
        }
    }

    /// Get the limits this store enforces.
    pub fn limits(&self) -> &LimitConfig {
        &self.limits
    }

    /// Count a request from `identity` and decide whether to admit it.
    pub fn admit(&self, identity: &ClientIdentity) -> Decision {
        self.admit_at(identity, Instant::now())
    }

    /// Count a request from `identity` observed at `now`.
    pub fn admit_at(&self, identity: &ClientIdentity, now: Instant) -> Decision {
        let LimitConfig {
            max_requests,
            window,
            ..
        } = self.limits;

        trace!(identity = %identity, "Checking request limit");

        // Existing identities avoid cloning the key.
        if let Some(mut record) = self.records.get_mut(identity.as_str()) {
            return Self::record_hit(identity, &mut record, now, window, max_requests);
        }

        match self.records.entry(identity.clone()) {
            Entry::Occupied(mut occupied) => {
                Self::record_hit(identity, occupied.get_mut(), now, window, max_requests)
            }
            Entry::Vacant(vacant) => {
                debug!(identity = %identity, "Creating new window counter");
                vacant.insert(WindowCounter::started_at(now));
                Decision::Allowed
            }
        }
    }

    fn record_hit(
        identity: &ClientIdentity,
        record: &mut WindowCounter,
        now: Instant,
        window: Duration,
        max_requests: u64,
    ) -> Decision {
        let decision = record.hit(now, window, max_requests);

        if decision == Decision::Denied {
            debug!(
                identity = %identity,
                count = record.count(),
                limit = max_requests,
                "Request limit exceeded"
            );
        } else if record.count() == 1 {
            debug!(identity = %identity, "Window expired, starting a new one");
        }

        decision
    }

    /// Remove records that have been stale for longer than the retention
    /// margin. Returns the number of records removed.
    pub fn reclaim_idle(&self) -> usize {
        self.reclaim_idle_at(Instant::now())
    }

    /// Remove records idle as of `now`.
    ///
    /// Each shard is write-locked while it is scanned, so a record is never
    /// removed in the middle of an admission check. A check that runs after
    /// the removal simply opens a fresh window.
    pub fn reclaim_idle_at(&self, now: Instant) -> usize {
        let LimitConfig {
            window, retention, ..
        } = self.limits;

        let mut removed = 0;
        self.records.retain(|_, record| {
            let idle = record.is_idle(now, window, retention);
            if idle {
                removed += 1;
            }
            !idle
        });

        if removed > 0 {
            debug!(
                removed = removed,
                remaining = self.records.len(),
                "Reclaimed idle window counters"
            );
        }
        removed
    }

    /// Get the current count for an identity.
    ///
    /// Returns `None` if no record exists for the identity.
    pub fn count_for(&self, identity: &ClientIdentity) -> Option<u64> {
        self.records.get(identity.as_str()).map(|r| r.count())
    }

    /// Clear all records.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Get the number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
