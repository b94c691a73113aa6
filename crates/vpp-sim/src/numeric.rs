//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Numeric helpers shared by the synthesizers."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::ops::Range;

use rand::Rng;

use crate::error::SimError;

/// Round half away from zero at `digits` decimal places.
///
/// Negative zero is normalised to `0.0` so serialized output never shows `-0`.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor + 0.0
}

pub fn round1(value: f64) -> f64 {
    round_to(value, 1)
}

pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

pub fn round3(value: f64) -> f64 {
    round_to(value, 3)
}

/// Uniform draw from the half-open `range`.
///
/// Degenerate ranges return `range.start` instead of panicking.
pub fn draw<R: Rng + ?Sized>(rng: &mut R, range: Range<f64>) -> f64 {
    range.start + rng.gen::<f64>() * (range.end - range.start)
}

/// Reject the first non-finite `(name, value)` pair.
pub fn ensure_finite<I>(fields: I) -> Result<(), SimError>
where
    I: IntoIterator<Item = (&'static str, f64)>,
{
    match fields.into_iter().find(|(_, value)| !value.is_finite()) {
        Some((field, value)) => Err(SimError::NonFinite { field, value }),
        None => Ok(()),
    }
}
