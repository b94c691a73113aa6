//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting the simulation controller."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Async rate limiter that keeps a fixed loop period.
///
/// The first tick completes one full period after construction, so callers
/// that already did their immediate work do not run twice.
#[derive(Debug)]
pub struct RateLimiter {
    interval: tokio::time::Interval,
}

impl RateLimiter {
    pub fn new(period: Duration) -> Self {
        Self::with_first_tick(period, period)
    }

    /// First tick after `first`, then one per `period`.
    pub fn with_first_tick(first: Duration, period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + first, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

/// Decision returned by a repeating task body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

#[derive(Debug, Default)]
struct CancelSignal {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    fn cancel(&self) -> bool {
        let first = !self.cancelled.swap(true, Ordering::SeqCst);
        if first {
            self.notify.notify_one();
        }
        first
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cancellable task that runs a body once per period on a tokio runtime.
///
/// Ticks never overlap: the body runs to completion before the next period is
/// awaited. The body runs on the blocking pool, so it may wait on locks
/// without stalling a runtime worker. Cancelling from inside the body lets the
/// body return normally and no further tick fires. Dropping the handle
/// cancels the task.
#[derive(Debug)]
pub struct RepeatingTask {
    signal: Arc<CancelSignal>,
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
    /// First tick one full period after spawning.
    pub fn spawn<F>(runtime: &Handle, period: Duration, body: F) -> Self
    where
        F: FnMut() -> TickControl + Send + 'static,
    {
        Self::spawn_after(runtime, period, period, body)
    }

    /// First tick after `first`, then one per `period`.
    pub fn spawn_after<F>(runtime: &Handle, first: Duration, period: Duration, mut body: F) -> Self
    where
        F: FnMut() -> TickControl + Send + 'static,
    {
        let signal = Arc::new(CancelSignal::default());
        let task_signal = signal.clone();
        let blocking = runtime.clone();
        let handle = runtime.spawn(async move {
            let mut limiter = RateLimiter::with_first_tick(first, period);
            loop {
                tokio::select! {
                    biased;
                    _ = task_signal.notify.notified() => {}
                    _ = limiter.tick() => {}
                }
                if task_signal.is_cancelled() {
                    break;
                }
                let outcome = blocking
                    .spawn_blocking(move || {
                        let control = body();
                        (body, control)
                    })
                    .await;
                match outcome {
                    Ok((returned, TickControl::Continue)) => body = returned,
                    Ok((_, TickControl::Stop)) => {
                        task_signal.cancel();
                        break;
                    }
                    Err(err) => {
                        debug!(error = %err, "repeating task body aborted");
                        task_signal.cancel();
                        break;
                    }
                }
            }
            debug!(period_ms = period.as_millis() as u64, "repeating task finished");
        });
        Self {
            signal,
            handle: Some(handle),
        }
    }

    /// Request cancellation. Returns `true` on the first call only.
    pub fn cancel(&self) -> bool {
        self.signal.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Cancel and wait for the loop to exit.
    pub async fn join(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                debug!(error = %err, "repeating task join failure");
            }
        }
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.signal.cancel();
    }
}
