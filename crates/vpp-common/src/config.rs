//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the VPP engine."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_tick_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_autostart() -> bool {
    true
}

fn default_history_capacity() -> usize {
    100
}

fn default_low_battery_soc() -> f64 {
    20.0
}

fn default_high_grid_import_kw() -> f64 {
    150.0
}

fn default_low_efficiency_pct() -> f64 {
    85.0
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_file_prefix() -> String {
    "vppd".to_owned()
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9899))
}

/// Primary configuration object for the VPP engine and daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub alerts: AlertThresholds,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
///
/// `source` is `None` when no file was found and defaults are in effect.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "VPP_CONFIG";

    /// Load configuration from disk, respecting the `VPP_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Self::load_with_source(candidates)?
            .map(|loaded| loaded.config)
            .ok_or_else(|| {
                anyhow!(
                    "no configuration files found. inspected: {}",
                    describe_candidates(candidates)
                )
            })
    }

    /// Load configuration from disk together with the effective source path.
    ///
    /// Returns `Ok(None)` when neither the environment override nor any
    /// candidate points at an existing file.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<Option<LoadedAppConfig>> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: Some(path),
                }));
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                }));
            }
        }
        Ok(None)
    }

    /// Like [`AppConfig::load_with_source`] but falls back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        match Self::load_with_source(candidates)? {
            Some(loaded) => Ok(loaded),
            None => {
                debug!(
                    inspected = %describe_candidates(candidates),
                    "no configuration file found, using defaults"
                );
                Ok(LoadedAppConfig {
                    config: AppConfig::default(),
                    source: None,
                })
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.alerts.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

fn describe_candidates<P: AsRef<Path>>(candidates: &[P]) -> String {
    candidates
        .iter()
        .map(|p| p.as_ref().display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Tick cadence and randomness settings for the simulation controller.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub tick_interval: Duration,
    /// Seed for the synthesizer RNG; entropy seeded when absent.
    #[serde(default)]
    pub random_seed: Option<u64>,
    #[serde(default = "default_autostart")]
    pub autostart: bool,
    /// Number of snapshots the daemon retains for its shutdown summary.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            random_seed: None,
            autostart: default_autostart(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(anyhow!("simulation.tick_interval must be greater than zero"));
        }
        Ok(())
    }
}

/// Threshold values for the alert rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Battery state of charge (percent) below which a warning fires.
    #[serde(default = "default_low_battery_soc")]
    pub low_battery_soc: f64,
    /// Grid import (kW) above which a warning fires.
    #[serde(default = "default_high_grid_import_kw")]
    pub high_grid_import_kw: f64,
    /// System efficiency (percent) below which an info alert fires.
    #[serde(default = "default_low_efficiency_pct")]
    pub low_efficiency_pct: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            low_battery_soc: default_low_battery_soc(),
            high_grid_import_kw: default_high_grid_import_kw(),
            low_efficiency_pct: default_low_efficiency_pct(),
        }
    }
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("alerts.low_battery_soc", self.low_battery_soc),
            ("alerts.high_grid_import_kw", self.high_grid_import_kw),
            ("alerts.low_efficiency_pct", self.low_efficiency_pct),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!(
                    "{} must be a finite non-negative number (got {})",
                    name,
                    value
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Daily files are named `<file_prefix>.log.<date>`.
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: default_log_file_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_cadence_and_thresholds() {
        let config = AppConfig::default();
        assert_eq!(config.simulation.tick_interval, Duration::from_secs(15));
        assert!(config.simulation.autostart);
        assert_eq!(config.alerts.low_battery_soc, 20.0);
        assert_eq!(config.alerts.high_grid_import_kw, 150.0);
        assert_eq!(config.alerts.low_efficiency_pct, 85.0);
        assert!(!config.metrics.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn parses_partial_toml() {
        let config: AppConfig = r#"
            [simulation]
            tick_interval = 5
            random_seed = 42

            [alerts]
            low_battery_soc = 25.0
        "#
        .parse()
        .unwrap();
        assert_eq!(config.simulation.tick_interval, Duration::from_secs(5));
        assert_eq!(config.simulation.random_seed, Some(42));
        assert_eq!(config.alerts.low_battery_soc, 25.0);
        assert_eq!(config.alerts.high_grid_import_kw, 150.0);
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let err = "[simulation]\ntick_interval = 0\n"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("tick_interval"));
    }

    #[test]
    fn rejects_negative_threshold() {
        let err = "[alerts]\nhigh_grid_import_kw = -1.0\n"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("high_grid_import_kw"));
    }
}
