//! Heartbeat failure detection

use std::time::Duration;

use tracing::debug;

use super::{ClusterEvent, ControlLoop, EventHub};
use crate::health::components;
use crate::scheduler::{reschedule_pods, RescheduleReport};
use crate::state::ClusterState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthMonitorConfig {
    /// Silence longer than this marks a node failed (default: 15 seconds)
    pub heartbeat_threshold: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            heartbeat_threshold: Duration::from_secs(15),
        }
    }
}

/// Fails silent nodes and moves their pods elsewhere.
///
/// Failed nodes stay registered; only a heartbeat brings them back.
pub struct HealthMonitor {
    state: ClusterState,
    hub: EventHub,
    config: HealthMonitorConfig,
}

impl HealthMonitor {
    pub fn new(state: ClusterState, hub: EventHub, config: HealthMonitorConfig) -> Self {
        Self { state, hub, config }
    }

    /// Run one detection pass, returning one report per node failed
    pub fn check(&self) -> Vec<RescheduleReport> {
        let threshold = self.config.heartbeat_threshold;
        let failed = self
            .state
            .write(|registry, now| registry.expire_heartbeats(now, threshold));

        let mut reports = Vec::with_capacity(failed.len());
        for node in failed {
            self.state.metrics().inc_nodes_failed();
            self.state
                .logger()
                .log_node_failed(&node.node_id, node.orphans.len());
            self.hub.publish(ClusterEvent::Alert {
                message: format!("Node {} failed!", node.node_id),
                node_id: Some(node.node_id),
            });

            reports.push(reschedule_pods(&self.state, node.node_id, node.orphans));
        }

        if !reports.is_empty() {
            self.state.publish_shape();
        }
        debug!(failed = reports.len(), "Health check complete");
        reports
    }
}

impl ControlLoop for HealthMonitor {
    fn name(&self) -> &'static str {
        components::HEALTH_MONITOR
    }

    fn tick(&mut self) {
        self.check();
    }
}
