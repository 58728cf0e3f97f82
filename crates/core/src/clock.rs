//! Injected time source.
//!
//! Every timestamp recorded into bill state (creation, line items, close) is
//! read through a [`Clock`]. A replayed actor is handed the same clock
//! readings again and therefore rebuilds bit-identical state.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Source of "current time" for command processing.
pub trait Clock: Send + Sync + core::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Shared clock handle passed into actors.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time. Used by the running service.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests and replays.
///
/// Every call to `now()` returns the current reading and then advances it by
/// `step`, so consecutive commands get distinct, predictable timestamps.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }

    /// A clock that never advances.
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::new(at, Duration::zero())
    }

    /// Move the clock forward without consuming a reading.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        *current += by;
    }

    /// The reading the next `now()` call will return.
    pub fn peek(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        let reading = *current;
        *current += self.step;
        reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_steps_after_each_reading() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start, Duration::seconds(5));

        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + Duration::seconds(5));

        clock.advance(Duration::minutes(1));
        assert_eq!(clock.peek(), start + Duration::seconds(70));
    }

    #[test]
    fn fixed_clock_never_moves() {
        let at = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        let clock = ManualClock::fixed(at);
        assert_eq!(clock.now(), at);
        assert_eq!(clock.now(), at);
    }
}
