//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the VPP engine."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Core shared primitives for the campus VPP workspace.
//! This crate exposes configuration loading, tracing setup, wall-clock
//! abstractions, and tick timing utilities consumed across the workspace.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod time;

pub use config::{
    AlertThresholds, AppConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, SimulationConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use metrics::{JitterStats, JitterSummary, LoopTimingReporter};
pub use time::{Clock, FixedClock, SystemClock};
