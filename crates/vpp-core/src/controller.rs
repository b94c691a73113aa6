//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Simulation controller lifecycle and tick production."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use vpp_common::config::{AlertThresholds, AppConfig};
use vpp_common::metrics::{JitterSummary, LoopTimingReporter};
use vpp_common::time::{Clock, SystemClock};
use vpp_logging::{log_system_event, vpp_debug, vpp_error, vpp_info, LogContext, SystemEventOutcome};
use vpp_metrics::EngineMetrics;
use vpp_rt::{RepeatingTask, TickControl};
use vpp_sim::{
    generate_optimizer_actions, AlertEvaluator, AlertEvent, ForecastPoint, OptimizerAction,
    TelemetrySnapshot, TelemetrySynthesizer,
};

use crate::error::EngineError;
use crate::hub::{DeliveryReport, DistributionHub, SubscriberCounts, Subscription};

const DEFAULT_CONTROLLER_NAME: &str = "campus";
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(15);

/// Lifecycle state of a [`SimulationController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

/// What one tick produced and how delivery went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// 1-based tick number since construction.
    pub tick: u64,
    pub alerts_raised: usize,
    pub telemetry: DeliveryReport,
    pub alerts: DeliveryReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickSource {
    Timer,
    Manual,
}

#[derive(Debug)]
enum Lifecycle {
    Stopped,
    Running {
        generation: u64,
        task: Option<RepeatingTask>,
    },
}

#[derive(Debug)]
struct ControllerInner {
    name: String,
    tick_interval: Duration,
    synthesizer: Mutex<TelemetrySynthesizer>,
    evaluator: AlertEvaluator,
    clock: Arc<dyn Clock>,
    hub: DistributionHub,
    metrics: Option<EngineMetrics>,
    lifecycle: Mutex<Lifecycle>,
    generation: AtomicU64,
    ticks: AtomicU64,
    // Serializes ticks; reentrant so listeners may call back into the controller.
    tick_lock: ReentrantMutex<()>,
    // Thread currently delivering a tick; only written under `tick_lock`.
    ticking_on: Mutex<Option<ThreadId>>,
    timing: LoopTimingReporter,
}

/// Drives the periodic synthesize, deliver, evaluate, deliver cycle.
///
/// Cloning yields another handle to the same controller. Listeners that need
/// to control the controller should capture a [`WeakController`] instead of a
/// clone so the controller can still be dropped.
#[derive(Debug, Clone)]
pub struct SimulationController {
    inner: Arc<ControllerInner>,
}

/// Non-owning controller handle.
#[derive(Debug, Clone)]
pub struct WeakController {
    inner: Weak<ControllerInner>,
}

impl WeakController {
    pub fn upgrade(&self) -> Option<SimulationController> {
        self.inner
            .upgrade()
            .map(|inner| SimulationController { inner })
    }
}

/// Assembles a [`SimulationController`] from its collaborators.
#[derive(Debug)]
pub struct ControllerBuilder {
    name: String,
    tick_interval: Duration,
    thresholds: AlertThresholds,
    synthesizer: Option<TelemetrySynthesizer>,
    seed: Option<u64>,
    clock: Arc<dyn Clock>,
    metrics: Option<EngineMetrics>,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self {
            name: DEFAULT_CONTROLLER_NAME.to_owned(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            thresholds: AlertThresholds::default(),
            synthesizer: None,
            seed: None,
            clock: Arc::new(SystemClock),
            metrics: None,
        }
    }
}

impl ControllerBuilder {
    /// Seed the builder from the `simulation` and `alerts` config sections.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tick_interval: config.simulation.tick_interval,
            thresholds: config.alerts,
            seed: config.simulation.random_seed,
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Use a prepared synthesizer; takes precedence over [`Self::seed`].
    pub fn synthesizer(mut self, synthesizer: TelemetrySynthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> SimulationController {
        let synthesizer = self
            .synthesizer
            .unwrap_or_else(|| TelemetrySynthesizer::from_optional_seed(self.seed));
        if let Some(metrics) = &self.metrics {
            metrics.set_running(false);
        }
        SimulationController {
            inner: Arc::new(ControllerInner {
                timing: LoopTimingReporter::new(self.tick_interval),
                name: self.name,
                tick_interval: self.tick_interval,
                synthesizer: Mutex::new(synthesizer),
                evaluator: AlertEvaluator::new(self.thresholds),
                clock: self.clock,
                hub: DistributionHub::new(self.metrics.clone()),
                metrics: self.metrics,
                lifecycle: Mutex::new(Lifecycle::Stopped),
                generation: AtomicU64::new(0),
                ticks: AtomicU64::new(0),
                tick_lock: ReentrantMutex::new(()),
                ticking_on: Mutex::new(None),
            }),
        }
    }
}

impl SimulationController {
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        ControllerBuilder::from_config(config).build()
    }

    pub fn downgrade(&self) -> WeakController {
        WeakController {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn tick_interval(&self) -> Duration {
        self.inner.tick_interval
    }

    /// Enter the running state: produce one tick immediately, then one per
    /// tick interval. Does nothing when already running.
    ///
    /// Called from a listener, the immediate tick runs as soon as the tick
    /// being delivered has reached every listener.
    ///
    /// Must be called from within a tokio runtime, which hosts the timer.
    pub fn start(&self) -> Result<(), EngineError> {
        let inner = &self.inner;
        let context = LogContext::new().with_controller(&inner.name);
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log_system_event(
                    Some(&context),
                    "controller.start",
                    "no tokio runtime available",
                    SystemEventOutcome::Fault,
                );
                return Err(EngineError::NoRuntime);
            }
        };

        let generation = {
            let mut lifecycle = inner.lifecycle.lock();
            if matches!(*lifecycle, Lifecycle::Running { .. }) {
                log_system_event(
                    Some(&context),
                    "controller.start",
                    "already running",
                    SystemEventOutcome::NoOp,
                );
                return Ok(());
            }
            let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *lifecycle = Lifecycle::Running {
                generation,
                task: None,
            };
            generation
        };

        inner.timing.reset();
        if let Some(metrics) = &inner.metrics {
            metrics.set_running(true);
        }
        log_system_event(
            Some(&context),
            "controller.start",
            "simulation started",
            SystemEventOutcome::Success,
        );

        let first_tick = if inner.is_ticking_here() {
            Duration::ZERO
        } else {
            inner.tick_logged();
            inner.tick_interval
        };

        let weak = Arc::downgrade(inner);
        let task = RepeatingTask::spawn_after(&runtime, first_tick, inner.tick_interval, move || {
            let Some(inner) = weak.upgrade() else {
                return TickControl::Stop;
            };
            // Checked under the tick lock so a stop() that returned while
            // another tick was in flight is always observed.
            let _serial = inner.tick_lock.lock();
            if !inner.is_current(generation) {
                return TickControl::Stop;
            }
            inner.tick_logged();
            if inner.is_current(generation) {
                TickControl::Continue
            } else {
                TickControl::Stop
            }
        });

        let mut lifecycle = inner.lifecycle.lock();
        match &mut *lifecycle {
            Lifecycle::Running {
                generation: current,
                task: slot,
            } if *current == generation => *slot = Some(task),
            // Stopped (or restarted) by a listener during the first tick.
            _ => {
                task.cancel();
            }
        }
        Ok(())
    }

    /// Leave the running state and cancel the timer. Does nothing when
    /// already stopped. Safe to call from inside a listener: the tick being
    /// delivered completes, later ticks never fire.
    pub fn stop(&self) {
        let inner = &self.inner;
        let context = LogContext::new().with_controller(&inner.name);
        let previous = std::mem::replace(&mut *inner.lifecycle.lock(), Lifecycle::Stopped);
        match previous {
            Lifecycle::Stopped => log_system_event(
                Some(&context),
                "controller.stop",
                "already stopped",
                SystemEventOutcome::NoOp,
            ),
            Lifecycle::Running { task, .. } => {
                if let Some(task) = task {
                    task.cancel();
                }
                if let Some(metrics) = &inner.metrics {
                    metrics.set_running(false);
                }
                log_system_event(
                    Some(&context),
                    "controller.stop",
                    "simulation stopped",
                    SystemEventOutcome::Success,
                );
            }
        }
    }

    pub fn state(&self) -> RunState {
        match *self.inner.lifecycle.lock() {
            Lifecycle::Stopped => RunState::Stopped,
            Lifecycle::Running { .. } => RunState::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Ticks produced since construction, across restarts.
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::SeqCst)
    }

    /// Produce one tick now, independent of the lifecycle state. Manual
    /// ticks are not part of the jitter statistics.
    pub fn tick_now(&self) -> Result<TickReport, EngineError> {
        self.inner.tick(TickSource::Manual)
    }

    pub fn subscribe_telemetry<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TelemetrySnapshot) + Send + Sync + 'static,
    {
        self.inner.hub.subscribe_telemetry(listener)
    }

    pub fn subscribe_alerts<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AlertEvent) + Send + Sync + 'static,
    {
        self.inner.hub.subscribe_alerts(listener)
    }

    pub fn subscriber_counts(&self) -> SubscriberCounts {
        self.inner.hub.subscriber_counts()
    }

    /// 24 hourly points starting at `now`; usable while stopped.
    pub fn generate_forecast(&self, now: NaiveDateTime) -> Result<Vec<ForecastPoint>, EngineError> {
        Ok(self.inner.synthesizer.lock().forecast(now)?)
    }

    pub fn generate_optimizer_actions(&self) -> Vec<OptimizerAction> {
        generate_optimizer_actions()
    }

    /// Spacing of consecutive timer ticks against the tick interval.
    pub fn jitter_summary(&self) -> Option<JitterSummary> {
        self.inner.timing.stats().summary()
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        self.inner.evaluator.thresholds()
    }

    pub fn metrics(&self) -> Option<&EngineMetrics> {
        self.inner.metrics.as_ref()
    }
}

impl ControllerInner {
    fn is_current(&self, generation: u64) -> bool {
        matches!(
            *self.lifecycle.lock(),
            Lifecycle::Running { generation: current, .. } if current == generation
        )
    }

    fn is_ticking_here(&self) -> bool {
        *self.ticking_on.lock() == Some(thread::current().id())
    }

    /// Timer-driven tick; failures are logged and the timer keeps running.
    fn tick_logged(&self) {
        if let Err(err) = self.tick(TickSource::Timer) {
            let context = LogContext::new().with_controller(&self.name);
            vpp_error!(context = context, "tick failed: {}", err);
        }
    }

    fn tick(&self, source: TickSource) -> Result<TickReport, EngineError> {
        let _serial = self.tick_lock.lock();
        let _marker = TickMarker::enter(&self.ticking_on);
        let started = Instant::now();
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let context = LogContext::new()
            .with_controller(&self.name)
            .with_tick(tick);

        if source == TickSource::Timer {
            if let Some(jitter) = self.timing.record_tick() {
                vpp_debug!(context = context.clone(), "tick jitter {}us", jitter);
            }
        }

        let now = self.clock.now();
        // Guard released before fan-out; listeners may request forecasts.
        let snapshot = self.synthesizer.lock().snapshot(now)?;
        let telemetry = self.hub.publish_telemetry(&snapshot);

        let raised = self.evaluator.evaluate_with_rules(&snapshot);
        let mut alerts = DeliveryReport::default();
        for (rule, alert) in &raised {
            if let Some(metrics) = &self.metrics {
                metrics.record_alert(rule.slug());
            }
            alerts.merge(self.hub.publish_alert(alert));
        }

        if let Some(metrics) = &self.metrics {
            metrics.observe_tick(started.elapsed().as_secs_f64());
        }
        if telemetry.failed > 0 || alerts.failed > 0 {
            vpp_info!(
                context = context,
                "tick delivered with {} listener failure(s)",
                telemetry.failed + alerts.failed
            );
        } else {
            vpp_debug!(
                context = context,
                "tick delivered to {} listener(s), {} alert(s)",
                telemetry.delivered,
                raised.len()
            );
        }

        Ok(TickReport {
            tick,
            alerts_raised: raised.len(),
            telemetry,
            alerts,
        })
    }
}

/// Marks the current thread as delivering a tick until dropped.
struct TickMarker<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
    previous: Option<ThreadId>,
}

impl<'a> TickMarker<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        let previous = slot.lock().replace(thread::current().id());
        Self { slot, previous }
    }
}

impl Drop for TickMarker<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = self.previous;
    }
}
