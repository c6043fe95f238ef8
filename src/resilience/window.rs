//! One-minute tumbling window of call outcomes.
//!
//! # Responsibilities
//! - Count successes and failures for the current wall-clock minute
//! - Report zero once the minute rolls over (no decay, sharp reset)
//!
//! # Design Decisions
//! - Buckets keyed by minute since epoch, counters are atomics so concurrent
//!   callers never lose increments
//! - Only the bucket for "now" is ever read
//! - Older buckets are dropped lazily when a new minute's bucket is created

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tick::Clock;

use crate::clock::minute_of;

/// Kind of outcome tracked by the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Counts read from the current bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowCounts {
    pub successes: u64,
    pub failures: u64,
}

impl WindowCounts {
    /// Total number of recorded calls.
    pub fn total(&self) -> u64 {
        self.successes.saturating_add(self.failures)
    }

    /// Failure fraction, or `None` when nothing was recorded.
    pub fn failure_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.failures as f64 / total as f64),
        }
    }
}

#[derive(Debug, Default)]
struct Bucket {
    successes: AtomicU64,
    failures: AtomicU64,
}

impl Bucket {
    fn counter(&self, outcome: Outcome) -> &AtomicU64 {
        match outcome {
            Outcome::Success => &self.successes,
            Outcome::Failure => &self.failures,
        }
    }
}

/// Per-minute success/failure counter owned by a single breaker.
#[derive(Debug)]
pub struct WindowCounter {
    buckets: DashMap<u64, Bucket>,
    clock: Clock,
}

impl WindowCounter {
    pub fn new(clock: Clock) -> Self {
        Self {
            buckets: DashMap::new(),
            clock,
        }
    }

    fn current_minute(&self) -> u64 {
        minute_of(self.clock.system_time())
    }

    /// Increment the counter for `outcome` in the current minute's bucket.
    pub fn record(&self, outcome: Outcome) {
        let minute = self.current_minute();
        let created = {
            let mut created = false;
            let bucket = self.buckets.entry(minute).or_insert_with(|| {
                created = true;
                Bucket::default()
            });
            bucket.counter(outcome).fetch_add(1, Ordering::Relaxed);
            created
        };

        // Entry guard is released above; retain would deadlock on the shard otherwise.
        if created {
            self.buckets.retain(|key, _| *key >= minute);
        }
    }

    /// Value of the `outcome` counter for the current minute, 0 if absent.
    pub fn read(&self, outcome: Outcome) -> u64 {
        self.buckets
            .get(&self.current_minute())
            .map(|bucket| bucket.counter(outcome).load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Both counters of the current minute.
    pub fn counts(&self) -> WindowCounts {
        match self.buckets.get(&self.current_minute()) {
            Some(bucket) => WindowCounts {
                successes: bucket.successes.load(Ordering::Relaxed),
                failures: bucket.failures.load(Ordering::Relaxed),
            },
            None => WindowCounts::default(),
        }
    }

    /// Drop every bucket.
    pub fn reset(&self) {
        self.buckets.clear();
    }

    /// Number of buckets currently held (including inert ones).
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
