//! Wall-clock source for cooldown math, swappable for simulated time.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::Mutex;
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations. Time only moves forward.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let step = ChronoDuration::from_std(by).unwrap_or(ChronoDuration::zero());
        let mut now = self.now.lock().expect("manual clock mutex poisoned");
        *now = *now + step;
    }
}

impl Default for ManualClock {
    /// Starts at the current time truncated to whole milliseconds, the
    /// resolution of persisted timestamps.
    fn default() -> Self {
        let now = Utc::now();
        let start = Utc
            .timestamp_millis_opt(now.timestamp_millis())
            .single()
            .unwrap_or(now);
        Self::at(start)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("manual clock mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::at(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now(), start + ChronoDuration::seconds(90));
    }
}
