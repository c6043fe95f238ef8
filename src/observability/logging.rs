//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from configuration
//! - Turn breaker events into structured log lines
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level
//! - Open is logged at warn, close at info, per-call events below that

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};
use crate::observability::notifier::{BreakerEvent, EventKind, Listener, ListenerError};

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let level = config.log_level.to_ascii_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("circuit_guard={level}")));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    }
}

/// Notifier listener that logs every breaker event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

impl Listener for LoggingListener {
    fn on_event(&self, event: &BreakerEvent) -> Result<(), ListenerError> {
        let payload = event.payload.as_deref().unwrap_or("");
        match event.kind {
            EventKind::Open => {
                tracing::warn!(breaker = %event.breaker, detail = payload, "breaker event: open");
            }
            EventKind::Close => {
                tracing::info!(breaker = %event.breaker, "breaker event: close");
            }
            EventKind::Failure => {
                tracing::debug!(breaker = %event.breaker, error = payload, "breaker event: failure");
            }
            EventKind::Success => {
                tracing::trace!(breaker = %event.breaker, "breaker event: success");
            }
        }
        Ok(())
    }
}
