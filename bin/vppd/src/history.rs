//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Bounded telemetry history and alert tallies for the daemon summary."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::collections::VecDeque;

use indexmap::IndexMap;
use vpp_sim::{AlertEvent, TelemetrySnapshot};

/// Most recent snapshots, oldest evicted first.
#[derive(Debug)]
pub struct TelemetryHistory {
    capacity: usize,
    samples: VecDeque<TelemetrySnapshot>,
    total_seen: u64,
}

impl TelemetryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            total_seen: 0,
        }
    }

    pub fn push(&mut self, snapshot: TelemetrySnapshot) {
        self.total_seen += 1;
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(snapshot);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&TelemetrySnapshot> {
        self.samples.back()
    }

    pub fn summary(&self) -> Option<HistorySummary> {
        let count = self.samples.len();
        if count == 0 {
            return None;
        }
        let n = count as f64;
        let mean = |f: fn(&TelemetrySnapshot) -> f64| self.samples.iter().map(f).sum::<f64>() / n;
        Some(HistorySummary {
            retained: count,
            total_seen: self.total_seen,
            first: self.samples.front().map(|s| s.timestamp.clone()).unwrap_or_default(),
            last: self.samples.back().map(|s| s.timestamp.clone()).unwrap_or_default(),
            mean_generation_kw: mean(TelemetrySnapshot::total_generation),
            mean_load_kw: mean(|s| s.load.total),
            mean_soc_pct: mean(|s| s.battery.soc),
            peak_import_kw: self
                .samples
                .iter()
                .map(|s| s.grid.import)
                .fold(0.0, f64::max),
            peak_export_kw: self
                .samples
                .iter()
                .map(|s| s.grid.export)
                .fold(0.0, f64::max),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub retained: usize,
    pub total_seen: u64,
    pub first: String,
    pub last: String,
    pub mean_generation_kw: f64,
    pub mean_load_kw: f64,
    pub mean_soc_pct: f64,
    pub peak_import_kw: f64,
    pub peak_export_kw: f64,
}

/// Alert counts keyed by title, in first-seen order.
#[derive(Debug, Default)]
pub struct AlertTally {
    counts: IndexMap<String, u64>,
}

impl AlertTally {
    pub fn record(&mut self, alert: &AlertEvent) {
        *self.counts.entry(alert.title.clone()).or_insert(0) += 1;
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(title, count)| (title.as_str(), *count))
    }
}
