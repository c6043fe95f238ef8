//! Circuit breaker for downstream protection.
//!
//! # Responsibilities
//! - Decide per call whether to run, reject, or probe
//! - Enforce the call timeout when no custom failure set is configured
//! - Record outcomes in the owned window counter
//! - Emit open/close/success/failure events
//!
//! # Data Flow
//! ```text
//! run(work)
//!     → open condition? (flag, else volume gate, else rate)
//!         → newly tripped: mark open, emit `open`, reject
//!         → open, sleep window pending: reject
//!         → half-open: take the single probe permit, execute
//!     → execute (with deadline if classifier is Default)
//!     → classify: success / classified failure / propagate
//! ```
//!
//! # Design Decisions
//! - Tripping is lazy: a failure never opens the breaker by itself, the next
//!   call discovers the open condition
//! - Open transition guarded by a compare-and-set on the open flag, so racing
//!   callers produce a single `open` event
//! - Caller work never runs under a breaker lock
//! - Rejections and classified failures are absorbed; anything else is
//!   returned to the caller untouched

use std::error::Error;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tick::Clock;

use crate::observability::notifier::{EventKind, Notifier};
use crate::resilience::classifier::FailureClassifier;
use crate::resilience::state::{self, BreakerSnapshot, BreakerState, Thresholds};
use crate::resilience::timeouts::{with_deadline, CallOptions};
use crate::resilience::window::{Outcome, WindowCounter, WindowCounts};

/// Immutable breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Minimum calls in the current window before tripping is considered.
    pub volume_threshold: u64,
    /// Failure fraction (0..=1) that trips the breaker.
    pub error_threshold_rate: f64,
    /// How long the breaker stays fully open before a probe.
    pub sleep_window: Duration,
    /// Deadline applied when `classifier` is `Default`.
    pub timeout: Duration,
    pub classifier: FailureClassifier,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            volume_threshold: 10,
            error_threshold_rate: 0.5,
            sleep_window: Duration::from_secs(5),
            timeout: Duration::from_secs(2),
            classifier: FailureClassifier::Default,
        }
    }
}

impl BreakerConfig {
    pub fn with_classifier(mut self, classifier: FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            volume_threshold: self.volume_threshold,
            error_threshold_rate: self.error_threshold_rate,
            sleep_window: self.sleep_window,
        }
    }
}

/// Why a call counted as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The breaker's own deadline elapsed.
    Timeout(Duration),
    /// The caller's error matched the configured failure set.
    Classified,
}

/// Result of a protected call that did not propagate an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    /// The work ran and returned a value.
    Success(T),
    /// The breaker was open; the work never ran.
    Rejected,
    /// The work ran and failed; the failure was recorded and swallowed.
    Failed(FailureReason),
}

impl<T> CallOutcome<T> {
    /// The value, or `None` for both rejection and failure.
    pub fn into_option(self) -> Option<T> {
        match self {
            CallOutcome::Success(value) => Some(value),
            CallOutcome::Rejected | CallOutcome::Failed(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, CallOutcome::Rejected)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CallOutcome::Failed(_))
    }
}

/// Releases the half-open probe permit on drop, whatever the exit path.
struct ProbeGuard<'a> {
    probing: &'a AtomicBool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.probing.store(false, Ordering::Release);
    }
}

/// A named guard around a fallible operation.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    open_flag: AtomicBool,
    opened_at: Mutex<Option<SystemTime>>,
    probing: AtomicBool,
    window: WindowCounter,
    notifier: Arc<Notifier>,
    clock: Clock,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        config: BreakerConfig,
        notifier: Arc<Notifier>,
        clock: Clock,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            open_flag: AtomicBool::new(false),
            opened_at: Mutex::new(None),
            probing: AtomicBool::new(false),
            window: WindowCounter::new(clock.clone()),
            notifier,
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Counts of the current one-minute window.
    pub fn counts(&self) -> WindowCounts {
        self.window.counts()
    }

    /// When the breaker last opened, `None` while closed.
    pub fn opened_at(&self) -> Option<SystemTime> {
        *self.opened_at.lock().expect("breaker mutex poisoned")
    }

    /// Whether the open transition has been recorded.
    pub fn is_open_flagged(&self) -> bool {
        self.open_flag.load(Ordering::Acquire)
    }

    pub fn has_passed_volume_threshold(&self) -> bool {
        state::has_passed_volume_threshold(&self.counts(), &self.config.thresholds())
    }

    pub fn has_passed_rate_threshold(&self) -> bool {
        state::has_passed_rate_threshold(&self.counts(), &self.config.thresholds())
    }

    pub fn is_open_condition(&self) -> bool {
        state::is_open_condition(
            self.is_open_flagged(),
            || self.window.counts(),
            &self.config.thresholds(),
        )
    }

    pub fn is_half_open(&self) -> bool {
        state::is_half_open(
            self.is_open_flagged(),
            self.opened_at(),
            self.clock.system_time(),
            self.config.sleep_window,
        )
    }

    /// Point-in-time view of the breaker.
    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            open_flag: self.is_open_flagged(),
            opened_at: self.opened_at(),
            counts: self.counts(),
            now: self.clock.system_time(),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.snapshot().state(&self.config.thresholds())
    }

    /// Closed → Open. Returns false (and does nothing) if already open.
    pub fn trip(&self) -> bool {
        if self
            .open_flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let now = self.clock.system_time();
        *self.opened_at.lock().expect("breaker mutex poisoned") = Some(now);

        let counts = self.counts();
        tracing::warn!(
            breaker = %self.name,
            successes = counts.successes,
            failures = counts.failures,
            "Circuit opened"
        );
        self.notifier.notify(EventKind::Open, &self.name, None, now);
        true
    }

    /// Half-Open → Open after a failed probe; re-arms the sleep window.
    fn reopen(&self) {
        let now = self.clock.system_time();
        *self.opened_at.lock().expect("breaker mutex poisoned") = Some(now);
        self.open_flag.store(true, Ordering::Release);

        tracing::warn!(breaker = %self.name, "Probe failed, circuit reopened");
        self.notifier.notify(EventKind::Open, &self.name, Some("probe failed".to_string()), now);
    }

    /// Half-Open → Closed after a successful probe.
    fn close(&self) {
        self.clear();
        tracing::info!(breaker = %self.name, "Probe succeeded, circuit closed");
        self.notifier.notify(EventKind::Close, &self.name, None, self.clock.system_time());
    }

    /// Force the breaker closed and forget the current window. No event is emitted.
    pub fn reset(&self) {
        self.clear();
        tracing::debug!(breaker = %self.name, "Circuit reset");
    }

    fn clear(&self) {
        // Stale counts would re-trip the breaker on the very next call.
        self.window.reset();
        *self.opened_at.lock().expect("breaker mutex poisoned") = None;
        self.open_flag.store(false, Ordering::Release);
    }

    fn try_acquire_probe(&self) -> Option<ProbeGuard<'_>> {
        self.probing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProbeGuard {
                probing: &self.probing,
            })
    }

    /// Run `work` under the breaker's protection.
    pub async fn run<F, Fut, T, E>(&self, work: F) -> Result<CallOutcome<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        self.run_with(CallOptions::default(), work).await
    }

    /// Like [`CircuitBreaker::run`], with per-call overrides.
    pub async fn run_with<F, Fut, T, E>(
        &self,
        options: CallOptions,
        work: F,
    ) -> Result<CallOutcome<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let flagged = self.is_open_flagged();
        let thresholds = self.config.thresholds();

        let probe = if state::is_open_condition(flagged, || self.window.counts(), &thresholds) {
            if !flagged {
                self.trip();
                tracing::debug!(breaker = %self.name, "Call rejected, circuit tripped");
                return Ok(CallOutcome::Rejected);
            }
            if !self.is_half_open() {
                tracing::debug!(breaker = %self.name, "Call rejected, circuit open");
                return Ok(CallOutcome::Rejected);
            }
            match self.try_acquire_probe() {
                Some(guard) => {
                    tracing::debug!(breaker = %self.name, "Half-open, probing");
                    Some(guard)
                }
                None => {
                    tracing::debug!(breaker = %self.name, "Call rejected, probe in flight");
                    return Ok(CallOutcome::Rejected);
                }
            }
        } else {
            None
        };
        let is_probe = probe.is_some();

        let result = if self.config.classifier.enforces_timeout() {
            let limit = options.effective_timeout(self.config.timeout);
            with_deadline(limit, work()).await
        } else {
            Ok(work().await)
        };

        match result {
            Ok(Ok(value)) => {
                self.on_success(is_probe);
                Ok(CallOutcome::Success(value))
            }
            Ok(Err(err)) => match self.config.classifier.matching_kind(&err) {
                Some(kind) => {
                    tracing::debug!(breaker = %self.name, kind = kind.label(), "Classified failure");
                    self.on_failure(is_probe, err.to_string());
                    Ok(CallOutcome::Failed(FailureReason::Classified))
                }
                None => Err(err),
            },
            Err(elapsed) => {
                self.on_failure(is_probe, elapsed.to_string());
                Ok(CallOutcome::Failed(FailureReason::Timeout(elapsed.0)))
            }
        }
    }

    fn on_success(&self, is_probe: bool) {
        self.window.record(Outcome::Success);
        self.notifier.notify(EventKind::Success, &self.name, None, self.clock.system_time());
        if is_probe {
            self.close();
        }
    }

    fn on_failure(&self, is_probe: bool, detail: String) {
        self.window.record(Outcome::Failure);
        tracing::debug!(breaker = %self.name, error = %detail, "Call failed");
        self.notifier.notify(EventKind::Failure, &self.name, Some(detail), self.clock.system_time());
        if is_probe {
            self.reopen();
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("open_flag", &self.is_open_flagged())
            .field("opened_at", &self.opened_at())
            .field("counts", &self.counts())
            .finish()
    }
}
