//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting the simulation controller."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Periodic scheduling helpers for the VPP runtime.

pub mod scheduling;

pub use scheduling::{RateLimiter, RepeatingTask, TickControl};
