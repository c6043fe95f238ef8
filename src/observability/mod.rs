//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! CircuitBreaker
//!     → notifier.rs (fire-and-forget event broadcast)
//!         → logging.rs (LoggingListener: structured log events)
//!         → metrics.rs (MetricsListener: counters, gauges)
//!         → any caller-registered listener
//! ```
//!
//! # Design Decisions
//! - The notifier is the only channel out of a breaker
//! - Listener failures are isolated from the breaker's control flow
//! - No listener is required; an empty notifier is a no-op

pub mod logging;
pub mod metrics;
pub mod notifier;

pub use notifier::{BreakerEvent, EventKind, Listener, ListenerError, ListenerId, Notifier};
