//! Time helpers shared by the window counter and the breaker.
//!
//! # Design Decisions
//! - Breakers read time from an injected [`tick::Clock`], never from
//!   `SystemTime::now()` directly; tests drive it with `tick::ClockControl`
//! - Wall-clock `SystemTime`, since window buckets are keyed by calendar minute

use std::time::{SystemTime, UNIX_EPOCH};

/// Truncate a timestamp to whole minutes since the epoch.
pub fn minute_of(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() / 60
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tick::ClockControl;

    use super::*;

    #[test]
    fn test_minute_truncation() {
        assert_eq!(minute_of(UNIX_EPOCH + Duration::from_secs(59)), 0);
        assert_eq!(minute_of(UNIX_EPOCH + Duration::from_secs(60)), 1);
        assert_eq!(minute_of(UNIX_EPOCH + Duration::from_secs(179)), 2);
    }

    #[test]
    fn test_minute_follows_controlled_clock() {
        let control = ClockControl::new_at(std::time::UNIX_EPOCH + Duration::from_secs(119));
        let clock = control.to_clock();
        assert_eq!(minute_of(clock.system_time()), 1);

        control.advance(Duration::from_secs(1));
        assert_eq!(minute_of(clock.system_time()), 2);
    }

    #[test]
    fn test_pre_epoch_time_is_minute_zero() {
        assert_eq!(minute_of(UNIX_EPOCH - Duration::from_secs(600)), 0);
    }
}
