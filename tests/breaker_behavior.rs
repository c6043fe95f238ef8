//! End-to-end behaviour of a single breaker driven through the registry.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use circuit_guard::config::loader::parse_config;
use circuit_guard::observability::notifier::EventKind;
use circuit_guard::{
    BreakerConfig, BreakerState, CallOptions, CallOutcome, FailureClassifier, FailureReason,
    Notifier, Registry,
};

mod common;
use common::{classified_config, fail, succeed, Downstream, Harness, InvalidRequest, OtherFailure};

#[tokio::test]
async fn test_volume_gate_dominates_rate() {
    let h = Harness::new();
    let cb = h.breaker("search", BreakerConfig {
        error_threshold_rate: 0.1,
        ..classified_config(10)
    });

    for _ in 0..9 {
        fail(&cb).await;
    }
    assert!(!cb.has_passed_volume_threshold());
    assert!(!cb.is_open_condition());

    // Still executes: 9 calls never reach the volume threshold.
    let ran = AtomicBool::new(false);
    let outcome = cb
        .run(|| async {
            ran.store(true, Ordering::SeqCst);
            Ok::<_, Downstream>(1)
        })
        .await
        .unwrap();
    assert_eq!(outcome, CallOutcome::Success(1));
    assert!(ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_trips_when_rate_reaches_threshold() {
    let h = Harness::new();
    let cb = h.breaker("billing", classified_config(5));

    for _ in 0..2 {
        succeed(&cb).await;
    }
    for _ in 0..3 {
        fail(&cb).await;
    }
    assert!(cb.has_passed_rate_threshold());
    assert!(!cb.is_open_flagged());

    let ran = AtomicBool::new(false);
    let outcome = cb
        .run(|| async {
            ran.store(true, Ordering::SeqCst);
            Ok::<_, Downstream>(())
        })
        .await
        .unwrap();

    assert_eq!(outcome, CallOutcome::Rejected);
    assert!(!ran.load(Ordering::SeqCst));
    assert!(cb.is_open_flagged());
    assert_eq!(cb.opened_at(), Some(h.clock.system_time()));
    assert_eq!(h.count(EventKind::Open), 1);
}

#[tokio::test]
async fn test_stays_closed_below_rate() {
    let h = Harness::new();
    let cb = h.breaker("billing", classified_config(5));

    for _ in 0..3 {
        succeed(&cb).await;
    }
    for _ in 0..2 {
        fail(&cb).await;
    }

    let outcome = cb.run(|| async { Ok::<_, Downstream>(()) }).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(cb.state(), BreakerState::Closed);
}

#[tokio::test]
async fn test_open_rejects_until_sleep_window_elapses() {
    let h = Harness::new();
    let cb = h.breaker("inventory", classified_config(1));
    fail(&cb).await;
    assert!(cb.run(|| async { Ok::<_, Downstream>(()) }).await.unwrap().is_rejected());

    let calls = AtomicU32::new(0);
    h.control.advance(Duration::from_secs(9));
    let outcome = cb
        .run(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Downstream>(())
        })
        .await
        .unwrap();
    assert_eq!(outcome, CallOutcome::Rejected);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // A rejection is not an event and is not counted.
    assert_eq!(h.kinds(), vec![EventKind::Failure, EventKind::Open]);
    assert_eq!(cb.counts().total(), 1);

    h.control.advance(Duration::from_secs(1));
    assert_eq!(cb.state(), BreakerState::HalfOpen);
    let outcome = cb
        .run(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Downstream>(())
        })
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_probe_success_closes_breaker() {
    let h = Harness::new();
    let cb = h.breaker("inventory", classified_config(2));
    fail(&cb).await;
    fail(&cb).await;
    assert!(cb.run(|| async { Ok::<_, Downstream>(()) }).await.unwrap().is_rejected());

    h.control.advance(Duration::from_secs(10));
    succeed(&cb).await;

    assert!(!cb.is_open_flagged());
    assert_eq!(cb.opened_at(), None);

    // Subsequent calls run normally instead of re-tripping on stale counts.
    for _ in 0..5 {
        let outcome = cb.run(|| async { Ok::<_, Downstream>(()) }).await.unwrap();
        assert!(outcome.is_success());
    }
    assert_eq!(
        h.kinds(),
        vec![
            EventKind::Failure,
            EventKind::Failure,
            EventKind::Open,
            EventKind::Success,
            EventKind::Close,
            EventKind::Success,
            EventKind::Success,
            EventKind::Success,
            EventKind::Success,
            EventKind::Success,
        ]
    );
}

#[tokio::test]
async fn test_probe_failure_reopens_and_rearms() {
    let h = Harness::new();
    let cb = h.breaker("inventory", classified_config(1));
    fail(&cb).await;
    cb.run(|| async { Ok::<_, Downstream>(()) }).await.unwrap();
    let first_opened = cb.opened_at().unwrap();

    h.control.advance(Duration::from_secs(12));
    let outcome = cb
        .run(|| async { Err::<(), _>(Downstream::Refused) })
        .await
        .unwrap();
    assert_eq!(outcome, CallOutcome::Failed(FailureReason::Classified));

    let reopened = cb.opened_at().unwrap();
    assert_eq!(reopened, h.clock.system_time());
    assert!(reopened > first_opened);
    assert_eq!(cb.state(), BreakerState::Open);
    assert_eq!(h.count(EventKind::Open), 2);

    // The sleep window counts from the probe failure.
    h.control.advance(Duration::from_secs(5));
    assert!(cb.run(|| async { Ok::<_, Downstream>(()) }).await.unwrap().is_rejected());
    h.control.advance(Duration::from_secs(5));
    assert!(cb.run(|| async { Ok::<_, Downstream>(()) }).await.unwrap().is_success());
}

#[tokio::test]
async fn test_window_rollover_forgets_failures() {
    let h = Harness::new();
    let cb = h.breaker("search", classified_config(3));
    fail(&cb).await;
    fail(&cb).await;
    assert_eq!(cb.counts().failures, 2);

    h.control.advance(Duration::from_secs(60));
    assert_eq!(cb.counts().total(), 0);

    fail(&cb).await;
    // One failure in the new minute is below the volume threshold.
    assert!(cb.run(|| async { Ok::<_, Downstream>(()) }).await.unwrap().is_success());
}

#[tokio::test]
async fn test_default_classifier_enforces_timeout() {
    let h = Harness::new();
    let cb = h.breaker("slow", BreakerConfig {
        timeout: Duration::from_millis(20),
        ..BreakerConfig::default()
    });

    let started = Instant::now();
    let outcome = cb
        .run(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, Downstream>(())
        })
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        outcome.unwrap(),
        CallOutcome::Failed(FailureReason::Timeout(Duration::from_millis(20)))
    );
    assert_eq!(cb.counts().failures, 1);
    assert_eq!(h.kinds(), vec![EventKind::Failure]);
}

#[tokio::test]
async fn test_timeout_override_takes_precedence() {
    let h = Harness::new();
    let cb = h.breaker("slow", BreakerConfig {
        timeout: Duration::from_secs(60),
        ..BreakerConfig::default()
    });

    let outcome = cb
        .run_with(CallOptions::with_timeout(Duration::from_millis(10)), || async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, Downstream>(())
        })
        .await
        .unwrap();
    assert_eq!(outcome, CallOutcome::Failed(FailureReason::Timeout(Duration::from_millis(10))));
}

#[tokio::test]
async fn test_custom_classifier_disables_timeout() {
    let h = Harness::new();
    let cb = h.breaker("batch", BreakerConfig {
        timeout: Duration::from_millis(5),
        classifier: FailureClassifier::custom().kind::<Downstream>(),
        ..BreakerConfig::default()
    });

    let outcome = cb
        .run(|| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, Downstream>("done")
        })
        .await
        .unwrap();
    assert_eq!(outcome, CallOutcome::Success("done"));
    assert_eq!(cb.counts().successes, 1);
}

#[tokio::test]
async fn test_unclassified_error_propagates_unrecorded() {
    let h = Harness::new();
    let cb = h.breaker("api", BreakerConfig {
        classifier: FailureClassifier::custom()
            .kind::<Downstream>()
            .kind::<InvalidRequest>(),
        ..BreakerConfig::default()
    });

    let result = cb.run(|| async { Err::<(), _>(OtherFailure) }).await;
    assert!(matches!(result, Err(OtherFailure)));
    assert_eq!(cb.counts().total(), 0);
    assert!(h.kinds().is_empty());

    let result = cb
        .run(|| async { Err::<(), _>(InvalidRequest("bad id".into())) })
        .await;
    assert_eq!(result.unwrap(), CallOutcome::Failed(FailureReason::Classified));
    assert_eq!(cb.counts().failures, 1);
}

#[tokio::test]
async fn test_default_classifier_propagates_caller_errors() {
    let h = Harness::new();
    let cb = h.breaker("api", BreakerConfig::default());

    let result = cb.run(|| async { Err::<(), _>(Downstream::Refused) }).await;
    assert!(matches!(result, Err(Downstream::Refused)));
    assert_eq!(cb.counts().total(), 0);
}

#[tokio::test]
async fn test_propagated_error_during_probe_releases_permit() {
    let h = Harness::new();
    let cb = h.breaker("api", classified_config(1));
    fail(&cb).await;
    cb.trip();
    h.control.advance(Duration::from_secs(10));

    let result = cb.run(|| async { Err::<(), _>(OtherFailure) }).await;
    assert!(result.is_err());
    // Neither closed nor re-armed.
    assert!(cb.is_open_flagged());
    assert!(cb.is_half_open());

    // The next call may probe again.
    assert!(cb.run(|| async { Ok::<_, Downstream>(()) }).await.unwrap().is_success());
    assert_eq!(cb.state(), BreakerState::Closed);
}

#[tokio::test]
async fn test_single_probe_in_half_open() {
    let h = Harness::new();
    let cb = h.breaker("api", classified_config(1));
    cb.trip();
    h.control.advance(Duration::from_secs(10));

    let (release, gate) = tokio::sync::oneshot::channel::<()>();
    let probe_cb = cb.clone();
    let probe = tokio::spawn(async move {
        probe_cb
            .run(|| async {
                let _ = gate.await;
                Ok::<_, Downstream>("probe")
            })
            .await
    });

    // Let the probe start and take the permit.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let outcome = cb.run(|| async { Ok::<_, Downstream>("other") }).await.unwrap();
    assert_eq!(outcome, CallOutcome::Rejected);

    release.send(()).unwrap();
    assert_eq!(probe.await.unwrap().unwrap(), CallOutcome::Success("probe"));
    assert_eq!(cb.state(), BreakerState::Closed);
}

#[tokio::test]
async fn test_sentinel_view_hides_rejection_and_failure() {
    let h = Harness::new();
    let cb = h.breaker("api", classified_config(1));

    let failed = cb
        .run(|| async { Err::<u8, _>(Downstream::Unavailable) })
        .await
        .unwrap();
    let rejected = cb.run(|| async { Ok::<u8, Downstream>(1) }).await.unwrap();

    assert!(failed.is_failed());
    assert!(rejected.is_rejected());
    assert_eq!(failed.into_option(), None);
    assert_eq!(rejected.into_option(), None);
}

#[tokio::test]
async fn test_configured_breaker_uses_supplied_classifier() {
    let h = Harness::new();
    let config = parse_config(
        r#"
[[breakers]]
name = "downstream"
volume_threshold = 2
"#,
    )
    .unwrap();
    let registry = Registry::from_config(&config, Arc::new(Notifier::new()), h.clock.clone(), |_| {
        FailureClassifier::custom().kind::<Downstream>()
    });

    // A later get cannot replace the classifier of a configured breaker.
    let cb = registry.get("downstream", BreakerConfig::default());
    let mut rejected = 0;
    for _ in 0..20 {
        match cb.run(|| async { Err::<(), _>(Downstream::Refused) }).await {
            Ok(CallOutcome::Rejected) => rejected += 1,
            Ok(outcome) => assert!(outcome.is_failed()),
            Err(e) => panic!("classified error escaped: {e}"),
        }
    }

    assert_eq!(cb.counts().failures, 2);
    assert_eq!(rejected, 18);
    assert_eq!(cb.state(), BreakerState::Open);
}
