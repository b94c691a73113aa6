//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Memoryless telemetry snapshot synthesis."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::f64::consts::PI;

use chrono::{NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vpp_common::time::SNAPSHOT_TIMESTAMP_FORMAT;

use crate::error::SimError;
use crate::forecast::generate_forecast;
use crate::frames::{
    BatteryReading, BatteryStatus, ForecastPoint, GridReading, KpiReading, LoadReading,
    SolarReading, TelemetrySnapshot, WeatherReading, WindReading,
};
use crate::numeric::{draw, ensure_finite, round1, round2};

/// Usable battery capacity in kWh.
pub const BATTERY_CAPACITY_KWH: f64 = 500.0;

const CO2_KG_PER_KWH: f64 = 0.45;
const TARIFF_USD_PER_KWH: f64 = 0.12;

/// Scales solar output and load by time of day.
pub fn time_multiplier(hour: u32) -> f64 {
    match hour {
        10..=14 => 1.2,
        6..=9 => 0.8,
        17..=21 => 0.9,
        _ => 0.6,
    }
}

/// Daytime solar hump: zero outside 06:00-18:00, peaking at noon.
pub fn solar_base(hour: u32, amplitude: f64) -> f64 {
    if (6..=18).contains(&hour) {
        150.0 + amplitude * ((f64::from(hour) - 6.0) / 12.0 * PI).sin()
    } else {
        0.0
    }
}

/// Synthesize one snapshot for `now`.
///
/// Only the hour of `now` shapes the values; everything else is drawn from
/// `rng`, so a seeded generator makes the result reproducible.
pub fn generate_snapshot<R: Rng + ?Sized>(
    now: NaiveDateTime,
    rng: &mut R,
) -> Result<TelemetrySnapshot, SimError> {
    let hour = now.hour();
    let multiplier = time_multiplier(hour);

    let solar = (solar_base(hour, 100.0) * draw(rng, 0.8..1.2) * multiplier).max(0.0);
    let wind = 50.0 + draw(rng, 0.0..80.0) * draw(rng, 0.7..1.3);
    let soc = draw(rng, 30.0..90.0);
    // Independent of SOC; there is no charge continuity between ticks.
    let battery_power = draw(rng, -50.0..50.0);
    let generation = solar + wind;
    let load = 80.0 + draw(rng, 0.0..120.0) * multiplier;

    let residual = load - generation - battery_power;
    let grid_import = residual.max(0.0);
    let grid_export = (-residual).max(0.0);

    let snapshot = TelemetrySnapshot {
        timestamp: now.format(SNAPSHOT_TIMESTAMP_FORMAT).to_string(),
        at: now,
        solar: SolarReading {
            power: round1(solar),
            daily: round1(solar * 24.0 * 0.6),
            efficiency: round1(draw(rng, 85.0..95.0)),
        },
        wind: WindReading {
            power: round1(wind),
            daily: round1(wind * 24.0 * 0.8),
            speed: round1(draw(rng, 5.0..20.0)),
        },
        battery: BatteryReading {
            soc: round1(soc),
            power: round1(battery_power),
            capacity: BATTERY_CAPACITY_KWH,
            status: BatteryStatus::from_power(battery_power),
        },
        grid: GridReading {
            import: round1(grid_import),
            export: round1(grid_export),
            frequency: round2(50.0 + draw(rng, -0.1..0.1)),
            voltage: round1(230.0 + draw(rng, -5.0..5.0)),
        },
        load: LoadReading {
            total: round1(load),
            hvac: round1(load * 0.4),
            lighting: round1(load * 0.2),
            other: round1(load * 0.4),
        },
        weather: WeatherReading {
            temperature: round1(draw(rng, 20.0..35.0)),
            humidity: round1(draw(rng, 40.0..80.0)),
            cloud_cover: round1(draw(rng, 0.0..100.0)),
            wind_speed: round1(draw(rng, 3.0..15.0)),
        },
        kpis: KpiReading {
            co2_saved: round1(generation * CO2_KG_PER_KWH),
            cost_saved: round2(generation * TARIFF_USD_PER_KWH),
            efficiency: round1(draw(rng, 92.0..98.0)),
            uptime: round1(draw(rng, 98.0..100.0)),
        },
    };
    ensure_finite(snapshot.numeric_fields())?;
    Ok(snapshot)
}

/// Parse a `yyyy-MM-dd HH:mm:ss` instant, the snapshot timestamp format.
pub fn parse_instant(input: &str) -> Result<NaiveDateTime, SimError> {
    NaiveDateTime::parse_from_str(input.trim(), SNAPSHOT_TIMESTAMP_FORMAT).map_err(|source| {
        SimError::InvalidTimestamp {
            input: input.to_owned(),
            source,
        }
    })
}

/// Owns the random source used for snapshots and forecasts.
#[derive(Debug, Clone)]
pub struct TelemetrySynthesizer<R = StdRng> {
    rng: R,
}

impl TelemetrySynthesizer<StdRng> {
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Seeded when `seed` is present, entropy seeded otherwise.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> TelemetrySynthesizer<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn snapshot(&mut self, now: NaiveDateTime) -> Result<TelemetrySnapshot, SimError> {
        generate_snapshot(now, &mut self.rng)
    }

    pub fn forecast(&mut self, now: NaiveDateTime) -> Result<Vec<ForecastPoint>, SimError> {
        generate_forecast(now, &mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::mock::StepRng;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(hour, 30, 0))
            .unwrap()
    }

    #[test]
    fn multiplier_windows() {
        assert_eq!(time_multiplier(12), 1.2);
        assert_eq!(time_multiplier(14), 1.2);
        assert_eq!(time_multiplier(6), 0.8);
        assert_eq!(time_multiplier(9), 0.8);
        assert_eq!(time_multiplier(17), 0.9);
        assert_eq!(time_multiplier(21), 0.9);
        assert_eq!(time_multiplier(15), 0.6);
        assert_eq!(time_multiplier(3), 0.6);
    }

    #[test]
    fn solar_hump_peaks_at_noon() {
        assert_eq!(solar_base(5, 100.0), 0.0);
        assert_eq!(solar_base(19, 100.0), 0.0);
        assert!((solar_base(6, 100.0) - 150.0).abs() < 1e-9);
        assert!((solar_base(12, 100.0) - 250.0).abs() < 1e-9);
        assert!((solar_base(18, 100.0) - 150.0).abs() < 1e-9);
        assert!(solar_base(12, 100.0) > solar_base(9, 100.0));
    }

    #[test]
    fn night_has_no_solar() {
        let mut synth = TelemetrySynthesizer::from_seed(7);
        for _ in 0..50 {
            let snapshot = synth.snapshot(at(2)).unwrap();
            assert_eq!(snapshot.solar.power, 0.0);
            assert_eq!(snapshot.solar.daily, 0.0);
        }
    }

    #[test]
    fn lowest_draws_follow_the_formulas() {
        // Every draw returns the bottom of its band.
        let mut rng = StepRng::new(0, 0);
        let snapshot = generate_snapshot(at(12), &mut rng).unwrap();
        // 250 * 0.8 * 1.2
        assert_eq!(snapshot.solar.power, 240.0);
        assert_eq!(snapshot.solar.daily, 3456.0);
        assert_eq!(snapshot.wind.power, 50.0);
        assert_eq!(snapshot.battery.soc, 30.0);
        assert_eq!(snapshot.battery.power, -50.0);
        assert_eq!(snapshot.battery.status, BatteryStatus::Discharging);
        assert_eq!(snapshot.load.total, 80.0);
        assert_eq!(snapshot.load.hvac, 32.0);
        // generation 290 + 50 discharge far exceeds the 80 kW load.
        assert_eq!(snapshot.grid.import, 0.0);
        assert_eq!(snapshot.grid.export, 160.0);
        assert_eq!(snapshot.kpis.co2_saved, 130.5);
        assert_eq!(snapshot.kpis.cost_saved, 34.8);
        assert_eq!(snapshot.grid.frequency, 49.9);
        assert_eq!(snapshot.kpis.efficiency, 92.0);
        assert_eq!(snapshot.timestamp, "2024-06-01 12:30:00");
    }

    #[test]
    fn parses_snapshot_timestamps() {
        assert_eq!(parse_instant(" 2024-06-01 12:30:00 ").unwrap(), at(12));
        let err = parse_instant("2024-06-01T12:30").unwrap_err();
        assert!(matches!(err, SimError::InvalidTimestamp { .. }));
        assert!(err.to_string().contains("2024-06-01T12:30"));
    }

    #[test]
    fn same_seed_same_snapshot() {
        let a = TelemetrySynthesizer::from_seed(99).snapshot(at(8)).unwrap();
        let b = TelemetrySynthesizer::from_seed(99).snapshot(at(8)).unwrap();
        assert_eq!(a, b);
    }
}
