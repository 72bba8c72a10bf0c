//! Scale-up under sustained load
//!
//! Adds one node whenever cluster utilization reaches the threshold and
//! the cooldown since the previous scale-up has passed. There is no
//! scale-down.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::ControlLoop;
use crate::health::components;
use crate::models::{NodeId, NodeSpec, NodeType, Pod, DEFAULT_NETWORK_GROUP};
use crate::random::{BoxedRandom, RandomSource};
use crate::state::{ClusterDefaults, ClusterState};

/// Network groups an unguided scale-up picks from
const SCALE_NETWORK_GROUPS: [&str; 2] = [DEFAULT_NETWORK_GROUP, "isolated"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoScalerConfig {
    /// Utilization at or above which a node is added (default: 0.8)
    pub threshold: f64,
    /// Minimum time between two scale-ups (default: 60 seconds)
    pub cooldown: Duration,
}

impl Default for AutoScalerConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// A node added by the autoscaler
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleUp {
    pub node_id: NodeId,
    pub at: DateTime<Utc>,
    pub utilization: f64,
    pub node_type: NodeType,
    pub network_group: String,
}

pub struct AutoScaler {
    state: ClusterState,
    config: AutoScalerConfig,
    rng: BoxedRandom,
    /// Monotonic reading of the previous scale-up
    last_scale: Option<Instant>,
}

impl AutoScaler {
    pub fn new(state: ClusterState, config: AutoScalerConfig, rng: BoxedRandom) -> Self {
        Self {
            state,
            config,
            rng,
            last_scale: None,
        }
    }

    pub fn last_scale(&self) -> Option<Instant> {
        self.last_scale
    }

    /// Decide and, if warranted, add one node in a single registry operation
    pub fn evaluate(&mut self) -> Option<ScaleUp> {
        let config = self.config;
        let last_scale = self.last_scale;
        let defaults = *self.state.defaults();
        let rng = &mut self.rng;

        let scaled = self.state.write(|registry, now| {
            let utilization = registry.utilization();
            if utilization < config.threshold {
                return None;
            }
            if let Some(last) = last_scale {
                if now.instant.saturating_duration_since(last) < config.cooldown {
                    debug!(utilization, "Scale-up suppressed by cooldown");
                    return None;
                }
            }

            let spec = match shape_node(registry.unplaced().first(), &defaults, rng.as_mut()) {
                Ok(spec) => spec,
                Err(e) => {
                    warn!(error = %e, "Cannot build autoscaled node");
                    return None;
                }
            };
            let (cpu, memory) = (spec.cpu, spec.memory);
            let (node_type, network_group) = (spec.node_type, spec.network_group.clone());
            let node_id = registry.insert_node(spec, now);
            registry.log(
                now.wall,
                format!(
                    "Auto-scaled: Added node {} ({} CPU, {}GB, Type: {}, Network Group: {})",
                    node_id, cpu, memory, node_type, network_group
                ),
            );

            let scaled = ScaleUp {
                node_id,
                at: now.wall,
                utilization,
                node_type,
                network_group,
            };
            Some((scaled, now.instant))
        });
        let (scaled, at) = scaled?;

        self.last_scale = Some(at);
        self.state.metrics().inc_autoscale_events();
        self.state.logger().log_scale_up(
            &scaled.node_id,
            scaled.utilization,
            scaled.node_type,
            &scaled.network_group,
        );
        self.state.publish_shape();
        Some(scaled)
    }
}

impl ControlLoop for AutoScaler {
    fn name(&self) -> &'static str {
        components::AUTOSCALER
    }

    fn tick(&mut self) {
        self.evaluate();
    }
}

/// Shape a new node after the oldest unplaced pod, or at random.
///
/// A guided node takes the pod's group and affinity, with at least the
/// pod's request as capacity, so the pod would be eligible on it.
fn shape_node(
    pending: Option<&Pod>,
    defaults: &ClusterDefaults,
    rng: &mut dyn RandomSource,
) -> Result<NodeSpec, crate::error::ClusterError> {
    let random_type = |rng: &mut dyn RandomSource| {
        rng.pick(NodeType::ALL.len())
            .map(|i| NodeType::ALL[i])
            .unwrap_or_default()
    };

    let spec = match pending {
        Some(pod) => {
            let node_type = match pod.node_affinity {
                Some(affinity) => affinity,
                None => random_type(rng),
            };
            NodeSpec::new(
                defaults.node_cpu.max(pod.cpu),
                defaults.node_memory.max(pod.memory),
            )?
            .with_node_type(node_type)
            .with_network_group(pod.network_group.clone())
        }
        None => {
            let node_type = random_type(rng);
            let group = rng
                .pick(SCALE_NETWORK_GROUPS.len())
                .map(|i| SCALE_NETWORK_GROUPS[i])
                .unwrap_or(DEFAULT_NETWORK_GROUP);
            NodeSpec::new(defaults.node_cpu, defaults.node_memory)?
                .with_node_type(node_type)
                .with_network_group(group)
        }
    };

    Ok(spec.with_simulated_heartbeat(true))
}
