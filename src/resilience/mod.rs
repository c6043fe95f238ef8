//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Protected call:
//!     → circuit_breaker.rs (open? half-open? decide to run or reject)
//!     → timeouts.rs (enforce deadline when no custom failure set)
//!     → classifier.rs (failure, success, or propagate)
//!     → window.rs (record outcome in the current minute)
//!     → state.rs (pure predicates over flag, timestamp and counts)
//! ```
//!
//! # Design Decisions
//! - State is derived, never stored as an enum
//! - Tripping is evaluated lazily at call time
//! - Bookkeeping is atomic; caller work runs outside any breaker lock

pub mod circuit_breaker;
pub mod classifier;
pub mod state;
pub mod timeouts;
pub mod window;

pub use circuit_breaker::{BreakerConfig, CallOutcome, CircuitBreaker, FailureReason};
pub use classifier::FailureClassifier;
pub use state::BreakerState;
pub use timeouts::CallOptions;
pub use window::WindowCounts;
