//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "integration"
//! ems_type: "source"
//! ems_scope: "test"
//! ems_description: "Band, invariant, and threshold tests for the synthesizers."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rand::rngs::StdRng;
use rand::SeedableRng;
use vpp_common::config::AlertThresholds;
use vpp_sim::{
    generate_forecast, generate_snapshot, AlertEvaluator, AlertSeverity, BatteryStatus,
    TelemetrySnapshot, TelemetrySynthesizer, FORECAST_HORIZON_HOURS,
};

fn day_hour(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 14)
        .and_then(|d| d.and_hms_opt(hour, 7, 0))
        .unwrap()
}

fn within(value: f64, lo: f64, hi: f64) -> bool {
    value >= lo && value <= hi
}

fn sample_day(seed: u64) -> Vec<TelemetrySnapshot> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..24)
        .flat_map(|hour| std::iter::repeat(hour).take(20))
        .map(|hour| generate_snapshot(day_hour(hour), &mut rng).unwrap())
        .collect()
}

#[test]
fn snapshot_fields_stay_in_band() {
    for seed in [1, 2, 3] {
        for s in sample_day(seed) {
            for (field, value) in s.numeric_fields() {
                assert!(value.is_finite(), "{field} not finite");
            }
            assert!(within(s.battery.soc, 30.0, 90.0), "soc {}", s.battery.soc);
            assert!(within(s.battery.power, -50.0, 50.0));
            assert_eq!(s.battery.capacity, 500.0);
            assert!(within(s.kpis.efficiency, 92.0, 98.0));
            assert!(within(s.kpis.uptime, 98.0, 100.0));
            assert!(within(s.solar.efficiency, 85.0, 95.0));
            assert!(within(s.solar.power, 0.0, 250.0 * 1.2 * 1.2));
            assert!(within(s.wind.power, 50.0, 50.0 + 80.0 * 1.3));
            assert!(within(s.wind.speed, 5.0, 20.0));
            assert!(within(s.load.total, 80.0, 80.0 + 120.0 * 1.2));
            assert!(within(s.grid.frequency, 49.9, 50.1));
            assert!(within(s.grid.voltage, 225.0, 235.0));
            assert!(within(s.weather.temperature, 20.0, 35.0));
            assert!(within(s.weather.humidity, 40.0, 80.0));
            assert!(within(s.weather.cloud_cover, 0.0, 100.0));
            assert!(within(s.weather.wind_speed, 3.0, 15.0));
            assert!(s.grid.import >= 0.0 && s.grid.export >= 0.0);
            assert!(s.kpis.co2_saved >= 0.0 && s.kpis.cost_saved >= 0.0);
        }
    }
}

#[test]
fn grid_import_and_export_are_never_both_positive() {
    for seed in 10..20 {
        for s in sample_day(seed) {
            assert!(
                !(s.grid.import > 0.0 && s.grid.export > 0.0),
                "import {} export {} at {}",
                s.grid.import,
                s.grid.export,
                s.timestamp
            );
        }
    }
}

#[test]
fn values_are_rounded_to_their_precision() {
    for s in sample_day(4) {
        for (field, value) in s.numeric_fields() {
            let digits = match field {
                "kpis.costSaved" | "grid.frequency" => 100.0,
                _ => 10.0,
            };
            let scaled = value * digits;
            assert!(
                (scaled - scaled.round()).abs() < 1e-6,
                "{field} = {value} not rounded"
            );
        }
    }
}

#[test]
fn battery_status_matches_power() {
    for s in sample_day(5) {
        match s.battery.status {
            BatteryStatus::Charging => assert!(s.battery.power >= 5.0),
            BatteryStatus::Discharging => assert!(s.battery.power <= -5.0),
            BatteryStatus::Idle => assert!(within(s.battery.power, -5.0, 5.0)),
        }
    }
}

#[test]
fn forecast_has_24_increasing_hourly_points() {
    let now = day_hour(21);
    let mut synth = TelemetrySynthesizer::from_seed(8);
    let forecast = synth.forecast(now).unwrap();
    assert_eq!(forecast.len(), FORECAST_HORIZON_HOURS);
    for (i, point) in forecast.iter().enumerate() {
        assert_eq!(point.at, now + TimeDelta::hours(i as i64));
        assert_eq!(point.timestamp, point.at.format("%H:%M").to_string());
        assert!(within(point.solar.confidence, 85.0, 95.0));
        assert!(within(point.wind.confidence, 70.0, 85.0));
        assert!(within(point.load.confidence, 90.0, 98.0));
        assert!(within(point.price.confidence, 80.0, 95.0));
        assert!(within(point.price.value, 0.08, 0.40));
        assert!(within(point.wind.value, 40.0, 130.0));
    }
    assert!(forecast.windows(2).all(|w| w[0].at < w[1].at));
}

#[test]
fn forecast_is_regenerated_per_call() {
    let now = day_hour(12);
    let mut rng = StdRng::seed_from_u64(3);
    let first = generate_forecast(now, &mut rng).unwrap();
    let second = generate_forecast(now, &mut rng).unwrap();
    assert_eq!(first.len(), second.len());
    assert_ne!(first, second);
}

fn quiet_snapshot() -> TelemetrySnapshot {
    let mut snapshot = TelemetrySynthesizer::from_seed(11)
        .snapshot(day_hour(12))
        .unwrap();
    snapshot.battery.soc = 25.0;
    snapshot.grid.import = 100.0;
    snapshot.grid.export = 0.0;
    snapshot.kpis.efficiency = 95.0;
    snapshot
}

#[test]
fn quiet_snapshot_raises_nothing() {
    let evaluator = AlertEvaluator::default();
    assert!(evaluator.evaluate(&quiet_snapshot()).is_empty());
}

#[test]
fn low_battery_raises_warning() {
    let mut snapshot = quiet_snapshot();
    snapshot.battery.soc = 15.0;
    let alerts = AlertEvaluator::default().evaluate(&snapshot);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Warning);
    assert!(alerts[0].title.contains("Low Battery"));
    assert_eq!(
        alerts[0].message,
        "Battery SOC is 15%. Consider charging soon."
    );
    assert_eq!(alerts[0].timestamp, snapshot.timestamp);
    assert!(!alerts[0].acknowledged);
}

#[test]
fn simultaneous_rules_fire_in_declaration_order() {
    let mut snapshot = quiet_snapshot();
    snapshot.battery.soc = 12.5;
    snapshot.grid.import = 200.0;
    snapshot.kpis.efficiency = 80.0;
    let alerts = AlertEvaluator::default().evaluate(&snapshot);
    let titles: Vec<_> = alerts.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(
        titles,
        ["Low Battery Level", "High Grid Import", "System Efficiency Alert"]
    );
    assert_eq!(alerts[1].message, "Grid import is 200 kW. Consider load reduction.");
    assert_eq!(alerts[2].severity, AlertSeverity::Info);
}

#[test]
fn high_grid_import_alone() {
    let mut snapshot = quiet_snapshot();
    snapshot.grid.import = 200.0;
    let alerts = AlertEvaluator::default().evaluate(&snapshot);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "High Grid Import");
    assert_eq!(alerts[0].severity, AlertSeverity::Warning);
}

#[test]
fn thresholds_are_strict() {
    let mut snapshot = quiet_snapshot();
    snapshot.battery.soc = 20.0;
    snapshot.grid.import = 150.0;
    snapshot.kpis.efficiency = 85.0;
    assert!(AlertEvaluator::default().evaluate(&snapshot).is_empty());
}

#[test]
fn persisting_condition_refires_with_fresh_ids() {
    // No debouncing: the same condition alerts on every evaluation.
    let mut snapshot = quiet_snapshot();
    snapshot.battery.soc = 10.0;
    let evaluator = AlertEvaluator::default();
    let first = evaluator.evaluate_at(&snapshot, 1_700_000_000_000);
    let second = evaluator.evaluate_at(&snapshot, 1_700_000_000_000);
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0].id, second[0].id);
    assert!(first[0].id.starts_with("battery-low-1700000000000-"));
}

#[test]
fn custom_thresholds_apply() {
    let evaluator = AlertEvaluator::new(AlertThresholds {
        low_battery_soc: 30.0,
        ..AlertThresholds::default()
    });
    let alerts = evaluator.evaluate(&quiet_snapshot());
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Low Battery Level");
}
