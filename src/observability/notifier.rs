//! Breaker event broadcast.
//!
//! # Responsibilities
//! - Fan every breaker event out to registered listeners
//! - Keep listener failures away from the breaker's control flow
//!
//! # Design Decisions
//! - Fire-and-forget: `notify` returns nothing, listeners run inline in
//!   registration order
//! - Listener list is copy-on-write behind `ArcSwap`; notify never blocks on
//!   a subscribe
//! - Listener errors and panics are caught and logged, never propagated

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use serde::Serialize;

/// Kinds of event a breaker emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Open,
    Close,
    Success,
    Failure,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Close => "close",
            EventKind::Success => "success",
            EventKind::Failure => "failure",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single breaker event.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerEvent {
    pub kind: EventKind,
    /// Name of the emitting breaker.
    pub breaker: String,
    /// Optional detail, e.g. the swallowed failure.
    pub payload: Option<String>,
    pub at: SystemTime,
}

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Something interested in breaker events.
pub trait Listener: Send + Sync {
    fn on_event(&self, event: &BreakerEvent) -> Result<(), ListenerError>;
}

impl<F> Listener for F
where
    F: Fn(&BreakerEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, event: &BreakerEvent) -> Result<(), ListenerError> {
        self(event)
    }
}

/// Handle returned by [`Notifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
struct Registered {
    id: ListenerId,
    listener: Arc<dyn Listener>,
}

/// Event sink shared by every breaker of a registry.
pub struct Notifier {
    listeners: ArcSwap<Vec<Registered>>,
    next_id: AtomicU64,
}

impl Notifier {
    /// A notifier with no listeners; events go nowhere.
    pub fn new() -> Self {
        Self {
            listeners: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener. It stays until [`Notifier::unsubscribe`].
    pub fn subscribe(&self, listener: Arc<dyn Listener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Registered { id, listener };
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(entry.clone());
            next
        });
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let previous = self.listeners.rcu(|current| {
            current
                .iter()
                .filter(|r| r.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|r| r.id == id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load().len()
    }

    /// Broadcast an event, stamped `at`, to every listener.
    pub fn notify(&self, kind: EventKind, breaker: &str, payload: Option<String>, at: SystemTime) {
        let listeners = self.listeners.load();
        if listeners.is_empty() {
            return;
        }

        let event = BreakerEvent {
            kind,
            breaker: breaker.to_string(),
            payload,
            at,
        };

        for registered in listeners.iter() {
            match catch_unwind(AssertUnwindSafe(|| registered.listener.on_event(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        breaker = %event.breaker,
                        event = %event.kind,
                        error = %e,
                        "Listener failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        breaker = %event.breaker,
                        event = %event.kind,
                        "Listener panicked"
                    );
                }
            }
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
