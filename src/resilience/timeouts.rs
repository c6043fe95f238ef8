//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap protected calls with a deadline
//! - Return to the caller as soon as the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - Whether the underlying work stops depends on the work itself (a spawned
//!   task or blocking thread keeps running)
//! - Timeout errors are distinct from caller errors

use std::future::Future;
use std::time::Duration;

use tokio::time;

/// The deadline passed before the work finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct Elapsed(pub Duration);

/// Per-call overrides accepted by the protected call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Replaces the breaker's configured timeout for this call only.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// The override if present, otherwise `default`.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }
}

/// Run `fut`, giving up after `limit`.
pub async fn with_deadline<F, T>(limit: Duration, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    time::timeout(limit, fut).await.map_err(|_| Elapsed(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_elapses() {
        let result = with_deadline(Duration::from_millis(10), std::future::pending::<()>()).await;
        assert_eq!(result, Err(Elapsed(Duration::from_millis(10))));
    }

    #[tokio::test]
    async fn test_fast_work_completes() {
        let result = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_override_precedence() {
        let default = Duration::from_secs(2);
        assert_eq!(CallOptions::default().effective_timeout(default), default);
        assert_eq!(
            CallOptions::with_timeout(Duration::from_millis(5)).effective_timeout(default),
            Duration::from_millis(5)
        );
    }
}
