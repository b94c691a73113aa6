//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Listener registries and synchronous fan-out."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Observer registries for telemetry snapshots and alert events.
//!
//! Fan-out is synchronous and follows registration order. Each publish works
//! on a copy of the registry taken when it starts, so listeners may subscribe
//! or unsubscribe (themselves or others) while being invoked: changes apply
//! from the next publish on. A panicking listener is logged and counted; the
//! remaining listeners still receive the value.
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use vpp_logging::{vpp_debug, vpp_warn, LogContext};
use vpp_metrics::EngineMetrics;
use vpp_sim::{AlertEvent, TelemetrySnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Telemetry,
    Alerts,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Telemetry => "telemetry",
            Channel::Alerts => "alerts",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one publish.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberCounts {
    pub telemetry: usize,
    pub alerts: usize,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
}

struct ListenerRegistry<T: ?Sized> {
    channel: Channel,
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Arc<T>)>>,
    metrics: Option<EngineMetrics>,
}

impl<T: ?Sized> ListenerRegistry<T> {
    fn new(channel: Channel, metrics: Option<EngineMetrics>) -> Self {
        Self {
            channel,
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
            metrics,
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn insert(&self, listener: Arc<T>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut entries = self.entries.lock();
            entries.push((id, listener));
            entries.len()
        };
        self.update_gauge(count);
        id
    }

    fn snapshot(&self) -> Vec<(u64, Arc<T>)> {
        self.entries.lock().clone()
    }

    fn update_gauge(&self, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.set_subscribers(self.channel.as_str(), count);
        }
    }

    fn record_failure(&self, id: u64, payload: Box<dyn Any + Send>) {
        let context = LogContext::new().with_channel(self.channel.as_str());
        vpp_warn!(
            context = context,
            "listener {} panicked: {}",
            id,
            panic_message(&*payload)
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_listener_failure(self.channel.as_str());
        }
    }
}

impl<T: ?Sized + Send + Sync> Detach for ListenerRegistry<T> {
    fn detach(&self, id: u64) -> bool {
        let (removed, count) = {
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            (entries.len() != before, entries.len())
        };
        if removed {
            self.update_gauge(count);
            let context = LogContext::new().with_channel(self.channel.as_str());
            vpp_debug!(context = context, "listener {} unsubscribed", id);
        }
        removed
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle that removes exactly one listener.
///
/// Dropping the handle leaves the listener registered.
#[derive(Clone)]
#[must_use = "keep the subscription to be able to unsubscribe the listener"]
pub struct Subscription {
    channel: Channel,
    id: u64,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the listener. Returns `true` only for the call that removed it;
    /// repeated calls, or calls after the hub is gone, are no-ops.
    pub fn unsubscribe(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.detach(self.id))
            .unwrap_or(false)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .finish()
    }
}

/// Telemetry and alert listener registries.
pub struct DistributionHub {
    telemetry: Arc<ListenerRegistry<dyn Fn(&TelemetrySnapshot) + Send + Sync>>,
    alerts: Arc<ListenerRegistry<dyn Fn(&AlertEvent) + Send + Sync>>,
}

impl Default for DistributionHub {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DistributionHub {
    pub fn new(metrics: Option<EngineMetrics>) -> Self {
        Self {
            telemetry: Arc::new(ListenerRegistry::new(Channel::Telemetry, metrics.clone())),
            alerts: Arc::new(ListenerRegistry::new(Channel::Alerts, metrics)),
        }
    }

    /// Register a listener for every snapshot published from now on.
    pub fn subscribe_telemetry<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TelemetrySnapshot) + Send + Sync + 'static,
    {
        let id = self.telemetry.insert(Arc::new(listener));
        let weak = Arc::downgrade(&self.telemetry);
        let registry: Weak<dyn Detach> = weak;
        Subscription {
            channel: Channel::Telemetry,
            id,
            registry,
        }
    }

    /// Register a listener for every alert published from now on.
    pub fn subscribe_alerts<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AlertEvent) + Send + Sync + 'static,
    {
        let id = self.alerts.insert(Arc::new(listener));
        let weak = Arc::downgrade(&self.alerts);
        let registry: Weak<dyn Detach> = weak;
        Subscription {
            channel: Channel::Alerts,
            id,
            registry,
        }
    }

    pub fn publish_telemetry(&self, snapshot: &TelemetrySnapshot) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (id, listener) in self.telemetry.snapshot() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(snapshot))) {
                Ok(()) => report.delivered += 1,
                Err(payload) => {
                    report.failed += 1;
                    self.telemetry.record_failure(id, payload);
                }
            }
        }
        report
    }

    pub fn publish_alert(&self, alert: &AlertEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (id, listener) in self.alerts.snapshot() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(alert))) {
                Ok(()) => report.delivered += 1,
                Err(payload) => {
                    report.failed += 1;
                    self.alerts.record_failure(id, payload);
                }
            }
        }
        report
    }

    pub fn subscriber_counts(&self) -> SubscriberCounts {
        SubscriberCounts {
            telemetry: self.telemetry.len(),
            alerts: self.alerts.len(),
        }
    }
}

impl fmt::Debug for DistributionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionHub")
            .field("subscribers", &self.subscriber_counts())
            .finish()
    }
}
