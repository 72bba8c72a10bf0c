//! Background control loops
//!
//! Each loop is a [`ControlLoop`] whose `tick` does its work as one or
//! more atomic registry operations. [`drive`] runs a loop on a fixed
//! period until shutdown. A panicking tick is logged and the loop keeps
//! going, so the health monitor and autoscaler never silently stop.
//! Repeated panics escalate the loop's health from degraded to unhealthy.

mod autoscaler;
mod broadcaster;
mod health_monitor;
mod heartbeat;
mod recorder;

pub use autoscaler::{AutoScaler, AutoScalerConfig, ScaleUp};
pub use broadcaster::{ClusterEvent, EventHub, StateBroadcaster};
pub use health_monitor::{HealthMonitor, HealthMonitorConfig};
pub use heartbeat::HeartbeatSimulator;
pub use recorder::UtilizationRecorder;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::health::HealthRegistry;
use crate::observability::ClusterMetrics;
use crate::random::{BoxedRandom, ThreadRandom};
use crate::state::ClusterState;

/// Periods of the background loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopIntervals {
    /// Health monitor and autoscaler (default: 5 seconds)
    pub health_check: Duration,
    /// Heartbeat simulator (default: 7 seconds)
    pub heartbeat_simulation: Duration,
    /// Utilization recorder (default: 10 seconds)
    pub utilization: Duration,
    /// State broadcaster (default: 3 seconds)
    pub broadcast: Duration,
}

impl Default for LoopIntervals {
    fn default() -> Self {
        Self {
            health_check: Duration::from_secs(5),
            heartbeat_simulation: Duration::from_secs(7),
            utilization: Duration::from_secs(10),
            broadcast: Duration::from_secs(3),
        }
    }
}

/// Consecutive panicking ticks after which a loop reports unhealthy
pub const UNHEALTHY_AFTER: u32 = 3;

/// One unit of periodic work
pub trait ControlLoop: Send + 'static {
    /// Component name used for health, metrics and logs
    fn name(&self) -> &'static str;

    fn tick(&mut self);
}

/// Run `control` every `period` until `shutdown` fires.
///
/// The first tick happens one period after start.
pub async fn drive<L: ControlLoop>(
    mut control: L,
    period: Duration,
    health: HealthRegistry,
    metrics: ClusterMetrics,
    mut shutdown: broadcast::Receiver<()>,
) {
    let name = control.name();
    info!(
        loop_name = name,
        period_ms = period.as_millis() as u64,
        "Starting control loop"
    );

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = 0u64;
    let mut failures = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let start = Instant::now();
                match catch_unwind(AssertUnwindSafe(|| control.tick())) {
                    Ok(()) => {
                        failures = 0;
                        health.set_healthy(name).await;
                    }
                    Err(panic) => {
                        failures = failures.saturating_add(1);
                        let reason = panic_message(panic.as_ref());
                        error!(loop_name = name, reason = %reason, failures, "Control loop tick panicked");
                        let message = format!("tick panicked: {}", reason);
                        if failures >= UNHEALTHY_AFTER {
                            health.set_unhealthy(name, message).await;
                        } else {
                            health.set_degraded(name, message).await;
                        }
                    }
                }
                metrics.observe_tick(name, start.elapsed().as_secs_f64());
                ticks += 1;
            }
            _ = shutdown.recv() => {
                info!(loop_name = name, ticks, "Stopping control loop");
                break;
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder that wires and spawns every background loop
pub struct ControlLoops {
    state: ClusterState,
    hub: EventHub,
    health: HealthRegistry,
    intervals: LoopIntervals,
    monitor: HealthMonitorConfig,
    autoscaler: AutoScalerConfig,
    random: Box<dyn Fn() -> BoxedRandom + Send>,
}

impl ControlLoops {
    pub fn new(state: ClusterState, hub: EventHub, health: HealthRegistry) -> Self {
        Self {
            state,
            hub,
            health,
            intervals: LoopIntervals::default(),
            monitor: HealthMonitorConfig::default(),
            autoscaler: AutoScalerConfig::default(),
            random: Box::new(ThreadRandom::boxed),
        }
    }

    pub fn with_intervals(mut self, intervals: LoopIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_health_monitor(mut self, config: HealthMonitorConfig) -> Self {
        self.monitor = config;
        self
    }

    pub fn with_autoscaler(mut self, config: AutoScalerConfig) -> Self {
        self.autoscaler = config;
        self
    }

    /// Replace the random source given to each loop that needs one
    pub fn with_random(mut self, random: impl Fn() -> BoxedRandom + Send + 'static) -> Self {
        self.random = Box::new(random);
        self
    }

    /// Spawn every loop; each stops when `shutdown` broadcasts
    pub fn spawn(self, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        let metrics = self.state.metrics().clone();
        let intervals = self.intervals;
        let mut handles = Vec::with_capacity(5);

        handles.push(tokio::spawn(drive(
            HealthMonitor::new(self.state.clone(), self.hub.clone(), self.monitor),
            intervals.health_check,
            self.health.clone(),
            metrics.clone(),
            shutdown.subscribe(),
        )));
        handles.push(tokio::spawn(drive(
            AutoScaler::new(self.state.clone(), self.autoscaler, (self.random)()),
            intervals.health_check,
            self.health.clone(),
            metrics.clone(),
            shutdown.subscribe(),
        )));
        handles.push(tokio::spawn(drive(
            HeartbeatSimulator::new(self.state.clone()),
            intervals.heartbeat_simulation,
            self.health.clone(),
            metrics.clone(),
            shutdown.subscribe(),
        )));
        handles.push(tokio::spawn(drive(
            UtilizationRecorder::new(self.state.clone()),
            intervals.utilization,
            self.health.clone(),
            metrics.clone(),
            shutdown.subscribe(),
        )));
        handles.push(tokio::spawn(drive(
            StateBroadcaster::new(self.state.clone(), self.hub.clone(), (self.random)()),
            intervals.broadcast,
            self.health.clone(),
            metrics,
            shutdown.subscribe(),
        )));

        info!(loops = handles.len(), "Control loops spawned");
        handles
    }
}
