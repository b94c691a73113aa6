//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Error types for telemetry synthesis."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use thiserror::Error;

/// Failures surfaced by the synthesizers instead of emitting garbage fields.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("time {base} plus {offset_hours}h is outside the representable range")]
    TimeOverflow { base: String, offset_hours: i64 },
    #[error("synthesized field `{field}` is not finite ({value})")]
    NonFinite { field: &'static str, value: f64 },
    #[error("invalid timestamp `{input}`")]
    InvalidTimestamp {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
}
