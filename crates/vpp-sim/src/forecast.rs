//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Stateless 24-hour forecast synthesis."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use chrono::{NaiveDateTime, TimeDelta, Timelike};
use rand::Rng;
use vpp_common::time::FORECAST_TIMESTAMP_FORMAT;

use crate::error::SimError;
use crate::frames::{ForecastPoint, ForecastValue};
use crate::generator::solar_base;
use crate::numeric::{draw, ensure_finite, round1, round3};

/// Number of hourly points in every forecast.
pub const FORECAST_HORIZON_HOURS: usize = 24;

const FORECAST_SOLAR_AMPLITUDE: f64 = 120.0;

/// Load shape: commute peaks, flat mid-day, low overnight.
pub fn load_multiplier(hour: u32) -> f64 {
    match hour {
        6..=9 | 17..=21 => 1.3,
        10..=16 => 1.0,
        _ => 0.7,
    }
}

/// Three-tier tariff band in $/kWh for the given hour.
pub fn price_band(hour: u32) -> std::ops::Range<f64> {
    match hour {
        17..=21 => 0.25..0.40,
        10..=16 => 0.15..0.25,
        _ => 0.08..0.15,
    }
}

/// Build the forecast for `now + i` hours, `i` in `0..24`.
///
/// Nothing is cached; each call draws fresh values from `rng`.
pub fn generate_forecast<R: Rng + ?Sized>(
    now: NaiveDateTime,
    rng: &mut R,
) -> Result<Vec<ForecastPoint>, SimError> {
    (0..FORECAST_HORIZON_HOURS as i64)
        .map(|offset| {
            let at = TimeDelta::try_hours(offset)
                .and_then(|delta| now.checked_add_signed(delta))
                .ok_or_else(|| SimError::TimeOverflow {
                    base: now.to_string(),
                    offset_hours: offset,
                })?;
            forecast_point(at, rng)
        })
        .collect()
}

fn forecast_point<R: Rng + ?Sized>(
    at: NaiveDateTime,
    rng: &mut R,
) -> Result<ForecastPoint, SimError> {
    let hour = at.hour();
    let solar = (solar_base(hour, FORECAST_SOLAR_AMPLITUDE) * draw(rng, 0.9..1.1)).max(0.0);
    let wind = 40.0 + draw(rng, 0.0..90.0);
    let load = (80.0 + draw(rng, 0.0..60.0)) * load_multiplier(hour);
    let price = draw(rng, price_band(hour));

    let point = ForecastPoint {
        timestamp: at.format(FORECAST_TIMESTAMP_FORMAT).to_string(),
        at,
        solar: ForecastValue {
            value: round1(solar),
            confidence: round1(draw(rng, 85.0..95.0)),
        },
        wind: ForecastValue {
            value: round1(wind),
            confidence: round1(draw(rng, 70.0..85.0)),
        },
        load: ForecastValue {
            value: round1(load),
            confidence: round1(draw(rng, 90.0..98.0)),
        },
        price: ForecastValue {
            value: round3(price),
            confidence: round1(draw(rng, 80.0..95.0)),
        },
    };
    ensure_finite([
        ("solar.value", point.solar.value),
        ("solar.confidence", point.solar.confidence),
        ("wind.value", point.wind.value),
        ("wind.confidence", point.wind.confidence),
        ("load.value", point.load.value),
        ("load.confidence", point.load.confidence),
        ("price.value", point.price.value),
        ("price.confidence", point.price.confidence),
    ])?;
    Ok(point)
}
