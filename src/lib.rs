//! Circuit breaker library.
//!
//! Wrap a fallible async operation in a named [`CircuitBreaker`], look
//! breakers up through a shared [`Registry`], and observe them through the
//! [`Notifier`].

pub mod clock;
pub mod config;
pub mod observability;
pub mod registry;
pub mod resilience;

pub use config::schema::GuardConfig;
pub use observability::notifier::Notifier;
pub use registry::Registry;
pub use resilience::circuit_breaker::{BreakerConfig, CallOutcome, CircuitBreaker, FailureReason};
pub use resilience::classifier::FailureClassifier;
pub use resilience::state::BreakerState;
pub use resilience::timeouts::CallOptions;
