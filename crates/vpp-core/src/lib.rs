//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Simulation controller and telemetry distribution."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Controller lifecycle and listener fan-out for the campus VPP engine.

pub mod controller;
pub mod error;
pub mod hub;

pub use controller::{
    ControllerBuilder, RunState, SimulationController, TickReport, WeakController,
};
pub use error::EngineError;
pub use hub::{Channel, DeliveryReport, DistributionHub, SubscriberCounts, Subscription};
