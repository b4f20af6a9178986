//! Metrics collection for the tape proxy
//!
//! Thread-safe counters over atomic operations. The counters feed the
//! process logs; there is no exposition endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for record and replay outcomes
#[derive(Debug, Default)]
pub struct TapeMetrics {
    // Replay outcomes
    replay_hits: AtomicU64,
    replay_misses: AtomicU64,
    replay_corrupted: AtomicU64,

    // Record outcomes
    recorded: AtomicU64,
    upstream_failures: AtomicU64,
    tape_write_failures: AtomicU64,
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeMetricsSnapshot {
    pub replay_hits: u64,
    pub replay_misses: u64,
    pub replay_corrupted: u64,
    pub recorded: u64,
    pub upstream_failures: u64,
    pub tape_write_failures: u64,
}

impl TapeMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a replay served from a tape
    pub fn record_replay_hit(&self) {
        self.replay_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a replay request with no matching tape
    pub fn record_replay_miss(&self) {
        self.replay_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a replay request that hit an unparsable artifact
    pub fn record_replay_corrupted(&self) {
        self.replay_corrupted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a captured exchange
    pub fn record_capture(&self) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upstream connection or response failure
    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed tape write (the caller was still served)
    pub fn record_write_failure(&self) {
        self.tape_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a consistent-enough snapshot of all counters
    pub fn snapshot(&self) -> TapeMetricsSnapshot {
        TapeMetricsSnapshot {
            replay_hits: self.replay_hits.load(Ordering::Relaxed),
            replay_misses: self.replay_misses.load(Ordering::Relaxed),
            replay_corrupted: self.replay_corrupted.load(Ordering::Relaxed),
            recorded: self.recorded.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            tape_write_failures: self.tape_write_failures.load(Ordering::Relaxed),
        }
    }
}
