//! Time provider abstraction for testable time-dependent logic
//!
//! The scheduler computes absolute due times and wake-up delays through a
//! [`TimeProvider`] so that tests can drive the clock explicitly.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::core::sync::lock_or_recover;

/// Abstraction over system time for testable time-dependent logic
pub trait TimeProvider: Send + Sync {
    /// Get the current monotonic time (for measuring intervals)
    fn now(&self) -> Instant;

    /// Get the current wall-clock time (for due times and timestamps)
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Production time provider using actual system time
#[derive(Debug, Default, Clone)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven time provider for deterministic testing
#[derive(Debug, Clone)]
pub struct MockTimeProvider {
    current_instant: Arc<Mutex<Instant>>,
    current_utc: Arc<Mutex<DateTime<Utc>>>,
}

impl Default for MockTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTimeProvider {
    /// Create a mock provider frozen at the current time
    pub fn new() -> Self {
        Self {
            current_instant: Arc::new(Mutex::new(Instant::now())),
            current_utc: Arc::new(Mutex::new(Utc::now())),
        }
    }

    /// Advance both monotonic and wall-clock time by the given duration
    pub fn advance_time(&self, duration: Duration) {
        {
            let mut instant = lock_or_recover(&self.current_instant, "mock instant");
            *instant += duration;
        }
        {
            let mut utc = lock_or_recover(&self.current_utc, "mock utc");
            *utc += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        }
    }

    /// Set the current wall-clock time
    pub fn set_utc(&self, time: DateTime<Utc>) {
        *lock_or_recover(&self.current_utc, "mock utc") = time;
    }
}

impl TimeProvider for MockTimeProvider {
    fn now(&self) -> Instant {
        *lock_or_recover(&self.current_instant, "mock instant")
    }

    fn utc_now(&self) -> DateTime<Utc> {
        *lock_or_recover(&self.current_utc, "mock utc")
    }
}

/// Convert the distance from `now` to `due` into a wait duration, clamped at zero
pub fn duration_until(now: DateTime<Utc>, due: DateTime<Utc>) -> Duration {
    (due - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_time_advances_both_clocks() {
        let provider = MockTimeProvider::new();
        let start_instant = provider.now();
        let start_utc = provider.utc_now();

        provider.advance_time(Duration::from_secs(5));

        assert_eq!(provider.now() - start_instant, Duration::from_secs(5));
        assert_eq!(provider.utc_now() - start_utc, chrono::Duration::seconds(5));
    }

    #[test]
    fn test_duration_until_clamps_past_due_times() {
        let now = Utc::now();
        let past = now - chrono::Duration::seconds(3);
        let future = now + chrono::Duration::milliseconds(250);

        assert_eq!(duration_until(now, past), Duration::ZERO);
        assert_eq!(duration_until(now, future), Duration::from_millis(250));
    }
}
