//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the VPP engine."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::time::jitter_us;

#[derive(Debug, Default, Clone, Copy)]
struct JitterTotals {
    samples: u64,
    sum_us: i128,
    max_abs_us: u64,
}

/// Running aggregates of signed tick jitter in microseconds.
#[derive(Debug, Default)]
pub struct JitterStats {
    totals: Mutex<JitterTotals>,
}

impl JitterStats {
    pub fn record(&self, jitter_us: i64) {
        let mut totals = self.totals.lock();
        totals.samples += 1;
        totals.sum_us += i128::from(jitter_us);
        totals.max_abs_us = totals.max_abs_us.max(jitter_us.unsigned_abs());
    }

    pub fn len(&self) -> u64 {
        self.totals.lock().samples
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> Option<JitterSummary> {
        let totals = *self.totals.lock();
        (totals.samples > 0).then(|| JitterSummary {
            mean_us: totals.sum_us as f64 / totals.samples as f64,
            max_abs_us: totals.max_abs_us,
            samples: totals.samples,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JitterSummary {
    pub mean_us: f64,
    pub max_abs_us: u64,
    pub samples: u64,
}

/// Measures the spacing of periodic ticks against their target period.
#[derive(Debug)]
pub struct LoopTimingReporter {
    target_interval: Duration,
    last_tick: Mutex<Option<Instant>>,
    stats: JitterStats,
}

impl LoopTimingReporter {
    pub fn new(target_interval: Duration) -> Self {
        Self {
            target_interval,
            last_tick: Mutex::new(None),
            stats: JitterStats::default(),
        }
    }

    /// Record a tick at `now`, returning the jitter against the previous tick.
    pub fn record_tick_at(&self, now: Instant) -> Option<i64> {
        let mut last_tick = self.last_tick.lock();
        let jitter = last_tick.map(|previous| {
            let jitter = jitter_us(now.saturating_duration_since(previous), self.target_interval);
            self.stats.record(jitter);
            jitter
        });
        *last_tick = Some(now);
        jitter
    }

    pub fn record_tick(&self) -> Option<i64> {
        self.record_tick_at(Instant::now())
    }

    /// Forget the previous tick so a restart does not count the idle gap.
    pub fn reset(&self) {
        *self.last_tick.lock() = None;
    }

    pub fn stats(&self) -> &JitterStats {
        &self.stats
    }
}
