//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "JSON and CSV rendering for one-shot daemon commands."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::io::Write;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use vpp_sim::ForecastPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

/// Flat forecast row; CSV cannot hold nested records.
#[derive(Debug, Serialize)]
struct ForecastRow<'a> {
    timestamp: &'a str,
    solar_kw: f64,
    solar_confidence: f64,
    wind_kw: f64,
    wind_confidence: f64,
    load_kw: f64,
    load_confidence: f64,
    price_per_kwh: f64,
    price_confidence: f64,
}

impl<'a> From<&'a ForecastPoint> for ForecastRow<'a> {
    fn from(point: &'a ForecastPoint) -> Self {
        Self {
            timestamp: &point.timestamp,
            solar_kw: point.solar.value,
            solar_confidence: point.solar.confidence,
            wind_kw: point.wind.value,
            wind_confidence: point.wind.confidence,
            load_kw: point.load.value,
            load_confidence: point.load.confidence,
            price_per_kwh: point.price.value,
            price_confidence: point.price.confidence,
        }
    }
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(mut out: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, value).context("failed to encode json")?;
    out.write_all(b"\n")?;
    Ok(())
}

pub fn write_forecast<W: Write>(out: W, points: &[ForecastPoint], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(out, points),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for point in points {
                writer
                    .serialize(ForecastRow::from(point))
                    .with_context(|| format!("failed to encode forecast row {}", point.timestamp))?;
            }
            writer.flush()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use vpp_sim::TelemetrySynthesizer;

    fn forecast() -> Vec<ForecastPoint> {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap();
        TelemetrySynthesizer::from_seed(21).forecast(now).unwrap()
    }

    #[test]
    fn csv_has_header_and_one_row_per_hour() {
        let mut buffer = Vec::new();
        write_forecast(&mut buffer, &forecast(), OutputFormat::Csv).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 25);
        assert_eq!(
            lines[0],
            "timestamp,solar_kw,solar_confidence,wind_kw,wind_confidence,load_kw,load_confidence,price_per_kwh,price_confidence"
        );
        assert!(lines[1].starts_with("08:00,"));
        assert!(lines[24].starts_with("07:00,"));
    }

    #[test]
    fn json_keeps_nested_shape() {
        let mut buffer = Vec::new();
        write_forecast(&mut buffer, &forecast(), OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        let points = parsed.as_array().unwrap();
        assert_eq!(points.len(), 24);
        assert!(points[0]["solar"]["confidence"].is_number());
        assert_eq!(points[0]["timestamp"], "08:00");
    }
}
