//! Breaker registry.
//!
//! # Responsibilities
//! - Hand out one shared breaker per name (get-or-create)
//! - Supply every breaker with the same notifier and clock
//! - Drop all breakers on demand (test isolation, cold restart)
//!
//! # Design Decisions
//! - An explicit object passed to whoever builds breakers, not a global
//! - First writer wins: a later `get` with a different config returns the
//!   existing breaker unchanged, so classifiers for configured breakers are
//!   supplied to `from_config` rather than to a later `get`
//! - `reset_all` is point-in-time; callers holding an `Arc` keep a detached
//!   breaker, later lookups see fresh instances

use std::sync::Arc;

use dashmap::DashMap;
use tick::Clock;

use crate::config::schema::{BreakerSettings, GuardConfig};
use crate::observability::notifier::Notifier;
use crate::resilience::circuit_breaker::{BreakerConfig, CircuitBreaker};
use crate::resilience::classifier::FailureClassifier;

/// Name → breaker mapping shared across callers.
#[derive(Debug)]
pub struct Registry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    notifier: Arc<Notifier>,
    clock: Clock,
}

impl Registry {
    pub fn new(notifier: Arc<Notifier>, clock: Clock) -> Self {
        Self {
            breakers: DashMap::new(),
            notifier,
            clock,
        }
    }

    /// Build a registry and create every breaker named in `config`.
    ///
    /// `classifier_for` picks the failure classifier of each configured
    /// breaker by name; the file format has no way to express one.
    pub fn from_config<F>(
        config: &GuardConfig,
        notifier: Arc<Notifier>,
        clock: Clock,
        classifier_for: F,
    ) -> Self
    where
        F: Fn(&str) -> FailureClassifier,
    {
        let registry = Self::new(notifier, clock);
        for named in &config.breakers {
            let settings = named.resolve(&config.defaults);
            registry.get_with_settings(&named.name, &settings, classifier_for(&named.name));
        }
        tracing::info!(breakers = registry.len(), "Registry initialised from config");
        registry
    }

    /// Existing breaker for `name`, or a new one built from `config`.
    pub fn get(&self, name: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.value().clone();
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(breaker = %name, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(
                    name,
                    config,
                    self.notifier.clone(),
                    self.clock.clone(),
                ))
            })
            .value()
            .clone()
    }

    /// [`Registry::get`] with file-based settings.
    pub fn get_with_settings(
        &self,
        name: &str,
        settings: &BreakerSettings,
        classifier: FailureClassifier,
    ) -> Arc<CircuitBreaker> {
        self.get(name, BreakerConfig::from(settings).with_classifier(classifier))
    }

    /// Existing breaker for `name`, without creating one.
    pub fn lookup(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|r| r.value().clone())
    }

    /// Sorted names of every registered breaker.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Drop every breaker and its counters.
    pub fn reset_all(&self) {
        let dropped = self.breakers.len();
        self.breakers.clear();
        tracing::info!(dropped, "Registry reset");
    }
}
