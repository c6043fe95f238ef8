//! Shared utilities for integration testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use circuit_guard::observability::notifier::{BreakerEvent, EventKind, ListenerError};
use circuit_guard::{BreakerConfig, CircuitBreaker, FailureClassifier, Notifier, Registry};
use tick::{Clock, ClockControl};

/// Error kinds used by the protected operations under test.
#[derive(Debug, thiserror::Error)]
pub enum Downstream {
    #[error("connection refused")]
    Refused,
    #[error("service unavailable")]
    Unavailable,
}

#[allow(dead_code)]
#[derive(Debug, thiserror::Error)]
#[error("invalid request: {0}")]
pub struct InvalidRequest(pub String);

#[allow(dead_code)]
#[derive(Debug, thiserror::Error)]
#[error("other failure")]
pub struct OtherFailure;

/// A registry on a controlled clock, plus a log of every emitted event.
#[allow(dead_code)]
pub struct Harness {
    pub control: ClockControl,
    pub clock: Clock,
    pub registry: Registry,
    pub events: Arc<Mutex<Vec<(EventKind, String)>>>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        // Minute-aligned so tests can move within a minute predictably.
        let control = ClockControl::new_at(std::time::UNIX_EPOCH + Duration::from_secs(60 * 28_000_000));
        let clock = control.to_clock();
        let notifier = Arc::new(Notifier::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        notifier.subscribe(Arc::new(move |event: &BreakerEvent| -> Result<(), ListenerError> {
            sink.lock().unwrap().push((event.kind, event.breaker.clone()));
            Ok(())
        }));
        let registry = Registry::new(notifier, clock.clone());
        Self {
            control,
            clock,
            registry,
            events,
        }
    }

    pub fn breaker(&self, name: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        self.registry.get(name, config)
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
    }
}

/// Config that trips on 50% failures over at least `volume` calls,
/// classifying `Downstream` errors as failures.
#[allow(dead_code)]
pub fn classified_config(volume: u64) -> BreakerConfig {
    BreakerConfig {
        volume_threshold: volume,
        error_threshold_rate: 0.5,
        sleep_window: Duration::from_secs(10),
        timeout: Duration::from_millis(50),
        classifier: FailureClassifier::custom().kind::<Downstream>(),
    }
}

/// Run a call that fails with a classified error.
#[allow(dead_code)]
pub async fn fail(cb: &CircuitBreaker) {
    let outcome = cb
        .run(|| async { Err::<(), _>(Downstream::Unavailable) })
        .await
        .expect("classified failures are swallowed");
    assert!(!outcome.is_success());
}

/// Run a call that succeeds.
#[allow(dead_code)]
pub async fn succeed(cb: &CircuitBreaker) {
    let outcome = cb
        .run(|| async { Ok::<_, Downstream>(()) })
        .await
        .expect("successes never error");
    assert!(!outcome.is_failed());
}
