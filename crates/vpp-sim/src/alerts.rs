//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Threshold alert evaluation over telemetry snapshots."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use vpp_common::config::AlertThresholds;
use vpp_common::time::epoch_millis;

use crate::frames::{AlertEvent, AlertSeverity, TelemetrySnapshot};

/// Process-wide emission counter; keeps ids unique within one millisecond.
static ALERT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// The independent threshold rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertRule {
    BatteryLow,
    GridHigh,
    EfficiencyLow,
}

impl AlertRule {
    pub const ALL: [AlertRule; 3] = [
        AlertRule::BatteryLow,
        AlertRule::GridHigh,
        AlertRule::EfficiencyLow,
    ];

    /// Prefix used in alert ids and metric labels.
    pub fn slug(&self) -> &'static str {
        match self {
            AlertRule::BatteryLow => "battery-low",
            AlertRule::GridHigh => "grid-high",
            AlertRule::EfficiencyLow => "efficiency-low",
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            AlertRule::BatteryLow | AlertRule::GridHigh => AlertSeverity::Warning,
            AlertRule::EfficiencyLow => AlertSeverity::Info,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AlertRule::BatteryLow => "Low Battery Level",
            AlertRule::GridHigh => "High Grid Import",
            AlertRule::EfficiencyLow => "System Efficiency Alert",
        }
    }

    /// Message for `snapshot` when the rule fires, `None` otherwise.
    pub fn check(
        &self,
        snapshot: &TelemetrySnapshot,
        thresholds: &AlertThresholds,
    ) -> Option<String> {
        match self {
            AlertRule::BatteryLow => (snapshot.battery.soc < thresholds.low_battery_soc).then(|| {
                format!(
                    "Battery SOC is {}%. Consider charging soon.",
                    snapshot.battery.soc
                )
            }),
            AlertRule::GridHigh => (snapshot.grid.import > thresholds.high_grid_import_kw)
                .then(|| {
                    format!(
                        "Grid import is {} kW. Consider load reduction.",
                        snapshot.grid.import
                    )
                }),
            AlertRule::EfficiencyLow => (snapshot.kpis.efficiency
                < thresholds.low_efficiency_pct)
                .then(|| {
                    format!(
                        "System efficiency is {}%. Check for maintenance needs.",
                        snapshot.kpis.efficiency
                    )
                }),
        }
    }
}

/// Checks every rule against a snapshot.
///
/// Rules are independent and carry no memory: a condition that holds on
/// consecutive ticks fires on each of them. Rate limiting is left to
/// consumers.
#[derive(Debug, Clone, Default)]
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
}

impl AlertEvaluator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    pub fn evaluate(&self, snapshot: &TelemetrySnapshot) -> Vec<AlertEvent> {
        self.evaluate_at(snapshot, epoch_millis())
    }

    /// Evaluate with an explicit emission instant in epoch milliseconds.
    pub fn evaluate_at(
        &self,
        snapshot: &TelemetrySnapshot,
        emitted_at_ms: i64,
    ) -> Vec<AlertEvent> {
        self.raise(snapshot, emitted_at_ms)
            .map(|(_, alert)| alert)
            .collect()
    }

    /// Like [`Self::evaluate`], with each alert paired with the rule that
    /// raised it.
    pub fn evaluate_with_rules(&self, snapshot: &TelemetrySnapshot) -> Vec<(AlertRule, AlertEvent)> {
        self.raise(snapshot, epoch_millis()).collect()
    }

    fn raise<'a>(
        &'a self,
        snapshot: &'a TelemetrySnapshot,
        emitted_at_ms: i64,
    ) -> impl Iterator<Item = (AlertRule, AlertEvent)> + 'a {
        AlertRule::ALL.into_iter().filter_map(move |rule| {
            rule.check(snapshot, &self.thresholds).map(|message| {
                let sequence = ALERT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
                let alert = AlertEvent {
                    id: format!("{}-{}-{}", rule.slug(), emitted_at_ms, sequence),
                    severity: rule.severity(),
                    title: rule.title().to_owned(),
                    message,
                    timestamp: snapshot.timestamp.clone(),
                    acknowledged: false,
                };
                (rule, alert)
            })
        })
    }
}
