//! Time-windowed snapshot cache.
//!
//! Holds the samples of the last completed collection round. The cache is
//! only ever touched while the orchestrator holds its mutex, so a replay
//! never races with a refill.

use std::time::Duration;

use tokio::time::Instant;

use crate::sample::Sample;

/// Outcome of a freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheGate {
    /// Stored snapshot is still valid; replay it.
    Hit,
    /// Stored snapshot was cleared; run a full round and refill it.
    Miss,
}

/// Cached snapshot plus the instant it was completed.
#[derive(Debug)]
pub struct SnapshotCache {
    window: Duration,
    last_collect: Option<Instant>,
    samples: Vec<Sample>,
}

impl SnapshotCache {
    /// Create an empty cache. The first gate check always misses.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_collect: None,
            samples: Vec::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn last_collect(&self) -> Option<Instant> {
        self.last_collect
    }

    /// Whether a snapshot completed at `last_collect` is still valid at `now`.
    ///
    /// A last-collect instant after `now` is treated as expired.
    pub fn is_fresh(&self, now: Instant) -> bool {
        match self.last_collect {
            Some(last) => now
                .checked_duration_since(last)
                .is_some_and(|age| age < self.window),
            None => false,
        }
    }

    /// Check freshness. On a miss the stored samples are truncated, keeping
    /// their allocation for the next round.
    pub fn gate(&mut self, now: Instant) -> CacheGate {
        if self.is_fresh(now) {
            CacheGate::Hit
        } else {
            self.samples.clear();
            CacheGate::Miss
        }
    }

    /// Stored samples in forwarding order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Vec<Sample> {
        &mut self.samples
    }

    /// Mark the round that filled the buffer as completed at `now`.
    pub fn complete(&mut self, now: Instant) {
        self.last_collect = Some(now);
    }
}
