//! Heartbeat simulation for nodes flagged as simulated

use tracing::trace;

use super::ControlLoop;
use crate::health::components;
use crate::state::ClusterState;

/// Refreshes `last_heartbeat` on every node whose heartbeat is simulated,
/// failed ones included.
pub struct HeartbeatSimulator {
    state: ClusterState,
}

impl HeartbeatSimulator {
    pub fn new(state: ClusterState) -> Self {
        Self { state }
    }

    pub fn pulse(&self) -> usize {
        let refreshed = self
            .state
            .write(|registry, now| registry.refresh_simulated_heartbeats(now));
        trace!(refreshed, "Simulated heartbeats refreshed");
        refreshed
    }
}

impl ControlLoop for HeartbeatSimulator {
    fn name(&self) -> &'static str {
        components::HEARTBEAT_SIMULATOR
    }

    fn tick(&mut self) {
        self.pulse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::control::{HealthMonitor, HealthMonitorConfig, EventHub};
    use crate::models::{NodeSpec, NodeStatus};
    use crate::state::ClusterDefaults;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_simulated_node_survives_health_checks() {
        let clock = Arc::new(ManualClock::default());
        let state = ClusterState::with_clock(ClusterDefaults::default(), clock.clone());
        let simulated = state.add_node(NodeSpec::new(8, 16).unwrap());
        let manual = state.add_node(NodeSpec::new(8, 16).unwrap().with_simulated_heartbeat(false));

        let simulator = HeartbeatSimulator::new(state.clone());
        let monitor = HealthMonitor::new(state.clone(), EventHub::new(), HealthMonitorConfig::default());

        for _ in 0..3 {
            clock.advance(Duration::from_secs(7));
            assert_eq!(simulator.pulse(), 1);
            monitor.check();
        }

        assert_eq!(state.node(&simulated).unwrap().status, NodeStatus::Active);
        assert_eq!(state.node(&simulated).unwrap().last_heartbeat, clock.now());
        assert_eq!(state.node(&manual).unwrap().status, NodeStatus::Failed);
    }
}
