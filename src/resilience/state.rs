//! Derived breaker state.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: calls are rejected without running
//! - Half-Open: the sleep window elapsed, one probe may run
//!
//! # State Transitions
//! ```text
//! Closed → Open: volume threshold reached AND failure rate >= threshold
//! Open → Half-Open: now - opened_at >= sleep_window
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (sleep window re-armed)
//! ```
//!
//! # Design Decisions
//! - No stored state enum: `open_flag` + `opened_at` are the source of truth
//! - Everything here is a pure function of a snapshot, testable without
//!   running a protected call

use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::resilience::window::WindowCounts;

/// Effective state, computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// The thresholds the predicates are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub volume_threshold: u64,
    pub error_threshold_rate: f64,
    pub sleep_window: Duration,
}

/// An immutable view of a breaker at one instant.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSnapshot {
    pub open_flag: bool,
    pub opened_at: Option<SystemTime>,
    pub counts: WindowCounts,
    pub now: SystemTime,
}

/// Enough calls in the current window for the rate to be meaningful.
pub fn has_passed_volume_threshold(counts: &WindowCounts, thresholds: &Thresholds) -> bool {
    counts.total() >= thresholds.volume_threshold
}

/// Failure fraction of the current window reached the error threshold.
pub fn has_passed_rate_threshold(counts: &WindowCounts, thresholds: &Thresholds) -> bool {
    counts
        .failure_rate()
        .is_some_and(|rate| rate >= thresholds.error_threshold_rate)
}

/// Open flag set, or both thresholds passed.
///
/// Short-circuits left to right: the counts are only consulted when the flag
/// is clear, and the rate only when the volume gate passed.
pub fn is_open_condition(
    open_flag: bool,
    counts: impl FnOnce() -> WindowCounts,
    thresholds: &Thresholds,
) -> bool {
    if open_flag {
        return true;
    }
    let counts = counts();
    has_passed_volume_threshold(&counts, thresholds) && has_passed_rate_threshold(&counts, thresholds)
}

/// Open flag set and the sleep window has fully elapsed.
pub fn is_half_open(
    open_flag: bool,
    opened_at: Option<SystemTime>,
    now: SystemTime,
    sleep_window: Duration,
) -> bool {
    if !open_flag {
        return false;
    }
    match opened_at {
        // A clock that went backwards counts as zero elapsed.
        Some(at) => now.duration_since(at).unwrap_or_default() >= sleep_window,
        None => false,
    }
}

impl BreakerSnapshot {
    pub fn is_open_condition(&self, thresholds: &Thresholds) -> bool {
        is_open_condition(self.open_flag, || self.counts, thresholds)
    }

    pub fn is_half_open(&self, thresholds: &Thresholds) -> bool {
        is_half_open(self.open_flag, self.opened_at, self.now, thresholds.sleep_window)
    }

    /// Effective state for reporting.
    pub fn state(&self, thresholds: &Thresholds) -> BreakerState {
        if self.is_half_open(thresholds) {
            BreakerState::HalfOpen
        } else if self.is_open_condition(thresholds) {
            BreakerState::Open
        } else {
            BreakerState::Closed
        }
    }
}
