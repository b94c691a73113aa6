//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the VPP engine."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fmt::Debug;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Format used for the `timestamp` field of telemetry snapshots and alerts.
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used for the hour-minute `timestamp` of forecast points.
pub const FORECAST_TIMESTAMP_FORMAT: &str = "%H:%M";

/// Source of wall-clock "now" for the synthesizers.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock, matching what an operator sees on the campus.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward, saturating at the last representable instant.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        *now = now.checked_add_signed(delta).unwrap_or(NaiveDateTime::MAX);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

/// Milliseconds since the Unix epoch for the current instant.
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert to human-friendly jitter units.
pub fn jitter_us(actual: Duration, expected: Duration) -> i64 {
    let actual_us = actual.as_secs_f64() * 1_000_000.0;
    let expected_us = expected.as_secs_f64() * 1_000_000.0;
    (actual_us - expected_us).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(noon());
        clock.advance(Duration::from_secs(15));
        assert_eq!(
            clock.now().format(SNAPSHOT_TIMESTAMP_FORMAT).to_string(),
            "2024-06-01 12:00:15"
        );
    }

    #[test]
    fn fixed_clock_saturates_at_max() {
        let clock = FixedClock::new(NaiveDateTime::MAX);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), NaiveDateTime::MAX);
    }

    #[test]
    fn jitter_is_signed() {
        assert_eq!(
            jitter_us(Duration::from_millis(15_002), Duration::from_secs(15)),
            2_000
        );
        assert_eq!(
            jitter_us(Duration::from_millis(14_999), Duration::from_secs(15)),
            -1_000
        );
    }
}
