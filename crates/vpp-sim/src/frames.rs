//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Telemetry, forecast, optimizer, and alert record shapes."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Records handed to dashboard consumers.
//!
//! Field names serialize in camelCase so the JSON matches what the chart,
//! report, and alert panels read.
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One synthesized measurement of the whole microgrid.
///
/// Built fresh every tick and never mutated afterwards; listeners receive it
/// by shared reference and clone it if they retain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    /// Wall-clock instant formatted as `yyyy-MM-dd HH:mm:ss`.
    pub timestamp: String,
    /// Instant the snapshot was synthesized for.
    pub at: NaiveDateTime,
    pub solar: SolarReading,
    pub wind: WindReading,
    pub battery: BatteryReading,
    pub grid: GridReading,
    pub load: LoadReading,
    pub weather: WeatherReading,
    pub kpis: KpiReading,
}

impl TelemetrySnapshot {
    /// Every numeric field with its dotted path, in declaration order.
    pub fn numeric_fields(&self) -> [(&'static str, f64); 25] {
        [
            ("solar.power", self.solar.power),
            ("solar.daily", self.solar.daily),
            ("solar.efficiency", self.solar.efficiency),
            ("wind.power", self.wind.power),
            ("wind.daily", self.wind.daily),
            ("wind.speed", self.wind.speed),
            ("battery.soc", self.battery.soc),
            ("battery.power", self.battery.power),
            ("battery.capacity", self.battery.capacity),
            ("grid.import", self.grid.import),
            ("grid.export", self.grid.export),
            ("grid.frequency", self.grid.frequency),
            ("grid.voltage", self.grid.voltage),
            ("load.total", self.load.total),
            ("load.hvac", self.load.hvac),
            ("load.lighting", self.load.lighting),
            ("load.other", self.load.other),
            ("weather.temperature", self.weather.temperature),
            ("weather.humidity", self.weather.humidity),
            ("weather.cloudCover", self.weather.cloud_cover),
            ("weather.windSpeed", self.weather.wind_speed),
            ("kpis.co2Saved", self.kpis.co2_saved),
            ("kpis.costSaved", self.kpis.cost_saved),
            ("kpis.efficiency", self.kpis.efficiency),
            ("kpis.uptime", self.kpis.uptime),
        ]
    }

    /// Solar plus wind output in kW.
    pub fn total_generation(&self) -> f64 {
        self.solar.power + self.wind.power
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarReading {
    /// kW
    pub power: f64,
    /// kWh, projected from the current output
    pub daily: f64,
    /// percent
    pub efficiency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindReading {
    pub power: f64,
    pub daily: f64,
    /// m/s at hub height
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryStatus {
    Charging,
    Discharging,
    Idle,
}

impl BatteryStatus {
    /// Classify a battery flow in kW; flows within ±5 kW count as idle.
    pub fn from_power(power: f64) -> Self {
        if power > 5.0 {
            BatteryStatus::Charging
        } else if power < -5.0 {
            BatteryStatus::Discharging
        } else {
            BatteryStatus::Idle
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    /// State of charge, percent.
    pub soc: f64,
    /// kW, negative while discharging.
    pub power: f64,
    /// kWh
    pub capacity: f64,
    pub status: BatteryStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridReading {
    pub import: f64,
    pub export: f64,
    /// Hz
    pub frequency: f64,
    /// V
    pub voltage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadReading {
    pub total: f64,
    pub hvac: f64,
    pub lighting: f64,
    pub other: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReading {
    /// °C
    pub temperature: f64,
    pub humidity: f64,
    pub cloud_cover: f64,
    pub wind_speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiReading {
    /// kg CO2 per hour
    pub co2_saved: f64,
    /// $ per hour
    pub cost_saved: f64,
    pub efficiency: f64,
    pub uptime: f64,
}

/// A forecast value with its confidence percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastValue {
    pub value: f64,
    pub confidence: f64,
}

/// One hourly entry of a 24-hour forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Hour-minute label, `HH:mm`.
    pub timestamp: String,
    /// Full instant the point stands for; labels wrap at midnight, this does not.
    pub at: NaiveDateTime,
    pub solar: ForecastValue,
    pub wind: ForecastValue,
    pub load: ForecastValue,
    pub price: ForecastValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Battery,
    Hvac,
    LoadShift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionImpact {
    /// kW
    pub grid_reduction: f64,
    /// $
    pub cost_saving: f64,
    /// kg
    pub co2_reduction: f64,
}

/// A recommendation record from the optimizer catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerAction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub title: String,
    pub description: String,
    pub time_window: String,
    pub impact: ActionImpact,
    pub status: ActionStatus,
    pub priority: ActionPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Error,
    Warning,
    Info,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Error => "error",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Info => "info",
        }
    }
}

/// A threshold crossing detected in one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Unique for every emission in the process lifetime.
    pub id: String,
    #[serde(rename = "type")]
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    /// Timestamp of the snapshot that triggered the alert.
    pub timestamp: String,
    pub acknowledged: bool,
}

impl AlertEvent {
    /// Mark the alert as seen. Only consumers call this.
    pub fn acknowledge(&mut self) {
        self.acknowledged = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_status_thresholds() {
        assert_eq!(BatteryStatus::from_power(5.1), BatteryStatus::Charging);
        assert_eq!(BatteryStatus::from_power(5.0), BatteryStatus::Idle);
        assert_eq!(BatteryStatus::from_power(-5.0), BatteryStatus::Idle);
        assert_eq!(BatteryStatus::from_power(-5.1), BatteryStatus::Discharging);
    }

    #[test]
    fn optimizer_action_uses_dashboard_field_names() {
        let action = OptimizerAction {
            id: "9".into(),
            kind: ActionKind::LoadShift,
            title: "t".into(),
            description: "d".into(),
            time_window: "22:00 - 06:00".into(),
            impact: ActionImpact {
                grid_reduction: 1.0,
                cost_saving: 2.0,
                co2_reduction: 3.0,
            },
            status: ActionStatus::Pending,
            priority: ActionPriority::Low,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "load_shift");
        assert_eq!(json["timeWindow"], "22:00 - 06:00");
        assert_eq!(json["impact"]["gridReduction"], 1.0);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["priority"], "low");
    }

    #[test]
    fn alert_acknowledge_only_flips_flag() {
        let mut alert = AlertEvent {
            id: "battery-low-1-0".into(),
            severity: AlertSeverity::Warning,
            title: "Low Battery Level".into(),
            message: "m".into(),
            timestamp: "2024-06-01 12:00:00".into(),
            acknowledged: false,
        };
        let before = alert.clone();
        alert.acknowledge();
        assert!(alert.acknowledged);
        assert_eq!(alert.id, before.id);
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "warning");
    }
}
