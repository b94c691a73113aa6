//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Binary entrypoint for the VPP daemon."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{ArgAction, Parser, Subcommand};
use parking_lot::Mutex;
use tokio::signal;
use tracing::{info, warn};
use vpp_common::config::{AppConfig, LoadedAppConfig};
use vpp_common::logging::init_tracing;
use vpp_common::time::{Clock, SystemClock};
use vpp_core::SimulationController;
use vpp_metrics::{new_registry, spawn_http_server, DaemonMetrics, EngineMetrics};
use vpp_sim::{
    generate_optimizer_actions, parse_instant, AlertSeverity, TelemetrySynthesizer,
};

mod history;
mod render;

use history::{AlertTally, TelemetryHistory};
use render::{write_forecast, write_json, OutputFormat};

const DEFAULT_CONFIG_CANDIDATES: &[&str] = &["configs/vppd.toml"];

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Campus VPP telemetry daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the simulation until interrupted")]
    Run,
    #[command(about = "Print one telemetry snapshot as JSON")]
    Snapshot {
        #[arg(long, help = "Random seed; overrides simulation.random_seed")]
        seed: Option<u64>,
        #[arg(long, value_name = "YYYY-MM-DD HH:MM:SS", help = "Instant to synthesize for")]
        at: Option<String>,
    },
    #[command(about = "Print the 24-hour forecast")]
    Forecast {
        #[arg(long, help = "Random seed; overrides simulation.random_seed")]
        seed: Option<u64>,
        #[arg(long, value_name = "YYYY-MM-DD HH:MM:SS", help = "First forecast hour")]
        at: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    #[command(about = "Print the optimizer action catalog as JSON")]
    Actions,
}

fn version_string() -> String {
    format!("vppd {}", env!("CARGO_PKG_VERSION"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", version_string());
        return Ok(());
    }

    let load_started = Instant::now();
    let loaded = load_config(cli.config.as_ref())?;
    let load_duration = load_started.elapsed();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(loaded, load_duration.as_secs_f64()).await?,
        Commands::Snapshot { seed, at } => {
            let now = resolve_instant(at.as_deref())?;
            let mut synth = synthesizer(&loaded.config, seed);
            let snapshot = synth.snapshot(now)?;
            write_json(io::stdout().lock(), &snapshot)?;
        }
        Commands::Forecast { seed, at, format } => {
            let now = resolve_instant(at.as_deref())?;
            let mut synth = synthesizer(&loaded.config, seed);
            let forecast = synth.forecast(now)?;
            write_forecast(io::stdout().lock(), &forecast, format)?;
        }
        Commands::Actions => {
            write_json(io::stdout().lock(), &generate_optimizer_actions())?;
        }
    }

    Ok(())
}

/// `--config` wins, then `VPP_CONFIG`, then the default candidates.
fn load_config(explicit: Option<&PathBuf>) -> Result<LoadedAppConfig> {
    match explicit {
        Some(path) => Ok(LoadedAppConfig {
            config: AppConfig::from_path(path)?,
            source: Some(path.clone()),
        }),
        None => AppConfig::load_or_default(DEFAULT_CONFIG_CANDIDATES),
    }
}

fn resolve_instant(at: Option<&str>) -> Result<NaiveDateTime> {
    match at {
        Some(input) => Ok(parse_instant(input)?),
        None => Ok(SystemClock.now()),
    }
}

fn synthesizer(config: &AppConfig, seed: Option<u64>) -> TelemetrySynthesizer {
    TelemetrySynthesizer::from_optional_seed(seed.or(config.simulation.random_seed))
}

async fn run_daemon(loaded: LoadedAppConfig, load_seconds: f64) -> Result<()> {
    let LoadedAppConfig { config, source } = loaded;
    init_tracing(&config.logging)?;
    match &source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults"),
    }

    let registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(registry.clone())?;
    daemon_metrics.observe_config_load(load_seconds);
    daemon_metrics.inc_start();
    daemon_metrics.set_build_info(env!("CARGO_PKG_VERSION"));
    let engine_metrics = EngineMetrics::new(registry.clone())?;

    let metrics_server = if config.metrics.enabled {
        let server = spawn_http_server(registry.clone(), config.metrics.listen)?;
        info!(address = %server.addr(), "metrics exporter enabled");
        Some(server)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    let controller = vpp_core::ControllerBuilder::from_config(&config)
        .metrics(engine_metrics)
        .build();

    let history = Arc::new(Mutex::new(TelemetryHistory::new(
        config.simulation.history_capacity,
    )));
    let tally = Arc::new(Mutex::new(AlertTally::default()));
    let _telemetry = subscribe_telemetry_logger(&controller, history.clone());
    let _alerts = subscribe_alert_logger(&controller, tally.clone());

    if config.simulation.autostart {
        controller
            .start()
            .context("failed to start simulation controller")?;
    } else {
        warn!("simulation.autostart is false; controller left stopped");
    }

    info!(
        tick_interval_secs = controller.tick_interval().as_secs(),
        "daemon running; waiting for termination signal"
    );
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    controller.stop();

    log_summary(&controller, &history.lock(), &tally.lock());

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    Ok(())
}

fn subscribe_telemetry_logger(
    controller: &SimulationController,
    history: Arc<Mutex<TelemetryHistory>>,
) -> vpp_core::Subscription {
    controller.subscribe_telemetry(move |snapshot| {
        info!(
            timestamp = %snapshot.timestamp,
            solar_kw = snapshot.solar.power,
            wind_kw = snapshot.wind.power,
            load_kw = snapshot.load.total,
            soc_pct = snapshot.battery.soc,
            grid_import_kw = snapshot.grid.import,
            grid_export_kw = snapshot.grid.export,
            "telemetry"
        );
        history.lock().push(snapshot.clone());
    })
}

fn subscribe_alert_logger(
    controller: &SimulationController,
    tally: Arc<Mutex<AlertTally>>,
) -> vpp_core::Subscription {
    controller.subscribe_alerts(move |alert| {
        match alert.severity {
            AlertSeverity::Error | AlertSeverity::Warning => warn!(
                id = %alert.id,
                severity = alert.severity.as_str(),
                title = %alert.title,
                "{}",
                alert.message
            ),
            AlertSeverity::Info => info!(
                id = %alert.id,
                severity = alert.severity.as_str(),
                title = %alert.title,
                "{}",
                alert.message
            ),
        }
        tally.lock().record(alert);
    })
}

fn log_summary(controller: &SimulationController, history: &TelemetryHistory, tally: &AlertTally) {
    match history.summary() {
        Some(summary) => info!(
            ticks = controller.ticks(),
            retained = summary.retained,
            seen = summary.total_seen,
            first = %summary.first,
            last = %summary.last,
            mean_generation_kw = summary.mean_generation_kw,
            mean_load_kw = summary.mean_load_kw,
            mean_soc_pct = summary.mean_soc_pct,
            peak_import_kw = summary.peak_import_kw,
            peak_export_kw = summary.peak_export_kw,
            "telemetry summary"
        ),
        None => info!(ticks = controller.ticks(), "no telemetry recorded"),
    }
    for (title, count) in tally.iter() {
        info!(title, count, "alert summary");
    }
    if let Some(jitter) = controller.jitter_summary() {
        info!(
            mean_us = jitter.mean_us,
            max_abs_us = jitter.max_abs_us,
            samples = jitter.samples,
            total_alerts = tally.total(),
            "tick timing"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn cli_defaults_to_run() {
        let cli = Cli::try_parse_from(["vppd"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.version);
    }

    #[test]
    fn cli_parses_forecast_options() {
        let cli = Cli::try_parse_from([
            "vppd",
            "forecast",
            "--seed",
            "42",
            "--format",
            "csv",
            "--at",
            "2024-06-01 08:00:00",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Forecast { seed, at, format }) => {
                assert_eq!(seed, Some(42));
                assert_eq!(at.as_deref(), Some("2024-06-01 08:00:00"));
                assert_eq!(format, OutputFormat::Csv);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn short_version_flag() {
        let cli = Cli::try_parse_from(["vppd", "-V"]).unwrap();
        assert!(cli.version);
        assert!(version_string().starts_with("vppd "));
    }

    #[test]
    fn explicit_config_path_is_used() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[simulation]\ntick_interval = 5\nrandom_seed = 9").unwrap();
        let path = file.path().to_path_buf();
        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.simulation.tick_interval.as_secs(), 5);
        assert_eq!(loaded.config.simulation.random_seed, Some(9));
    }

    #[test]
    fn cli_seed_overrides_config_seed() {
        let mut config = AppConfig::default();
        config.simulation.random_seed = Some(1);
        let now = parse_instant("2024-06-01 12:00:00").unwrap();
        let from_cli = synthesizer(&config, Some(2)).snapshot(now).unwrap();
        let expected = TelemetrySynthesizer::from_seed(2).snapshot(now).unwrap();
        assert_eq!(from_cli, expected);
        let from_config = synthesizer(&config, None).snapshot(now).unwrap();
        assert_eq!(from_config, TelemetrySynthesizer::from_seed(1).snapshot(now).unwrap());
    }

    #[test]
    fn bad_instant_is_reported() {
        let err = resolve_instant(Some("noon")).unwrap_err();
        assert!(err.to_string().contains("noon"));
    }
}
