//! Failure classification.
//!
//! # Responsibilities
//! - Decide which errors count against the breaker
//! - Select whether the breaker enforces its own timeout
//!
//! # Design Decisions
//! - `Default` trusts only the built-in timeout; every caller error propagates
//! - `Custom` is a set of error kinds matched through `std::error::Error`
//!   downcasting, plus arbitrary predicates for enum variants and the like
//! - A custom set disables the automatic timeout entirely

use std::error::Error;
use std::fmt;
use std::sync::Arc;

type Matcher = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;

/// Which outcomes count as failures.
#[derive(Clone, Default)]
pub enum FailureClassifier {
    /// Only a breaker-enforced timeout is a failure.
    #[default]
    Default,
    /// Errors matching any entry are failures; no timeout is applied.
    Custom(Vec<FailureKind>),
}

/// One entry of a custom failure set.
#[derive(Clone)]
pub struct FailureKind {
    label: String,
    matcher: Matcher,
}

impl FailureKind {
    pub fn label(&self) -> &str {
        &self.label
    }

    fn matches(&self, error: &(dyn Error + 'static)) -> bool {
        (self.matcher)(error)
    }
}

impl fmt::Debug for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FailureKind").field(&self.label).finish()
    }
}

impl fmt::Debug for FailureClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClassifier::Default => write!(f, "Default"),
            FailureClassifier::Custom(kinds) => f.debug_tuple("Custom").field(kinds).finish(),
        }
    }
}

impl FailureClassifier {
    /// An empty custom set. Nothing counts as a failure until kinds are added,
    /// and no timeout is enforced.
    pub fn custom() -> Self {
        FailureClassifier::Custom(Vec::new())
    }

    /// Add an error type to the set.
    ///
    /// Matches when the error is a `K`. Turns a `Default` classifier into a
    /// custom one.
    pub fn kind<K>(self) -> Self
    where
        K: Error + 'static,
    {
        self.push(FailureKind {
            label: std::any::type_name::<K>().to_string(),
            matcher: Arc::new(|e: &(dyn Error + 'static)| e.is::<K>()),
        })
    }

    /// Add a predicate to the set.
    pub fn matching<F>(self, label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.push(FailureKind {
            label: label.into(),
            matcher: Arc::new(predicate),
        })
    }

    fn push(self, kind: FailureKind) -> Self {
        let mut kinds = match self {
            FailureClassifier::Default => Vec::new(),
            FailureClassifier::Custom(kinds) => kinds,
        };
        kinds.push(kind);
        FailureClassifier::Custom(kinds)
    }

    /// Whether the breaker wraps calls with its own timeout.
    pub fn enforces_timeout(&self) -> bool {
        matches!(self, FailureClassifier::Default)
    }

    /// Whether a caller error counts against the breaker.
    pub fn is_failure(&self, error: &(dyn Error + 'static)) -> bool {
        self.matching_kind(error).is_some()
    }

    /// First entry of the failure set that matches `error`.
    pub fn matching_kind(&self, error: &(dyn Error + 'static)) -> Option<&FailureKind> {
        match self {
            FailureClassifier::Default => None,
            FailureClassifier::Custom(kinds) => kinds.iter().find(|k| k.matches(error)),
        }
    }
}
