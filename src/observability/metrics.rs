//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Expose a Prometheus-compatible metrics endpoint
//! - Count breaker events per breaker
//!
//! # Metrics
//! - `circuit_breaker_events_total` (counter): events by breaker, event kind
//! - `circuit_breaker_open` (gauge): 1=open, 0=closed
//!
//! # Design Decisions
//! - Fed from the notifier, so breakers know nothing about metrics
//! - Recording without an installed exporter is a no-op

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::observability::notifier::{BreakerEvent, EventKind, Listener, ListenerError};

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Record a single breaker event.
pub fn record_event(breaker: &str, kind: EventKind) {
    metrics::counter!(
        "circuit_breaker_events_total",
        "breaker" => breaker.to_string(),
        "event" => kind.as_str()
    )
    .increment(1);

    match kind {
        EventKind::Open => {
            metrics::gauge!("circuit_breaker_open", "breaker" => breaker.to_string()).set(1.0);
        }
        EventKind::Close => {
            metrics::gauge!("circuit_breaker_open", "breaker" => breaker.to_string()).set(0.0);
        }
        EventKind::Success | EventKind::Failure => {}
    }
}

/// Notifier listener feeding [`record_event`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsListener;

impl Listener for MetricsListener {
    fn on_event(&self, event: &BreakerEvent) -> Result<(), ListenerError> {
        record_event(&event.breaker, event.kind);
        Ok(())
    }
}
