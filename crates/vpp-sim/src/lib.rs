//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "01-bootstrap"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Simulation module exports and shared types."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Procedural telemetry for the campus virtual power plant.
//!
//! Everything in this crate is a pure function of "now" plus an injected
//! random source: snapshots are memoryless, forecasts are regenerated on
//! every call, and alert evaluation inspects a single snapshot.

pub mod alerts;
pub mod error;
pub mod forecast;
pub mod frames;
pub mod generator;
pub mod numeric;
pub mod optimizer;

pub use alerts::{AlertEvaluator, AlertRule};
pub use error::SimError;
pub use forecast::{generate_forecast, FORECAST_HORIZON_HOURS};
pub use frames::{
    ActionImpact, ActionKind, ActionPriority, ActionStatus, AlertEvent, AlertSeverity,
    BatteryReading, BatteryStatus, ForecastPoint, ForecastValue, GridReading, KpiReading,
    LoadReading, OptimizerAction, SolarReading, TelemetrySnapshot, WeatherReading, WindReading,
};
pub use generator::{generate_snapshot, parse_instant, TelemetrySynthesizer};
pub use optimizer::generate_optimizer_actions;
