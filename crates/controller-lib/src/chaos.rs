//! Random destruction of a node or a pod for resilience testing

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::models::{NodeId, PodId};
use crate::random::{BoxedRandom, ThreadRandom};
use crate::scheduler::{reschedule_pods, RescheduleReport};
use crate::state::ClusterState;

/// What one chaos invocation destroyed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChaosOutcome {
    /// An active node was failed; its pods went through rescheduling
    NodeKilled {
        node_id: NodeId,
        rescheduled: usize,
        unplaced: usize,
    },
    /// A pod was removed and its request returned to the node
    PodKilled { node_id: NodeId, pod_id: PodId },
    /// Nothing qualified for the chosen branch
    NoOp { reason: String },
}

impl ChaosOutcome {
    pub fn message(&self) -> String {
        match self {
            ChaosOutcome::NodeKilled { node_id, .. } => {
                format!("Chaos Monkey: Node {} was killed", node_id)
            }
            ChaosOutcome::PodKilled { node_id, pod_id } => {
                format!("Chaos Monkey: Pod pod-{} on node {} was killed", pod_id, node_id)
            }
            ChaosOutcome::NoOp { reason } => format!("Chaos Monkey: {}", reason),
        }
    }

    pub fn target(&self) -> &'static str {
        match self {
            ChaosOutcome::NodeKilled { .. } => "node",
            ChaosOutcome::PodKilled { .. } => "pod",
            ChaosOutcome::NoOp { .. } => "none",
        }
    }
}

enum Strike {
    Node(NodeId, Vec<crate::models::Pod>),
    Pod(NodeId, PodId),
    Miss(&'static str),
}

pub struct ChaosInjector {
    state: ClusterState,
    rng: Mutex<BoxedRandom>,
}

impl ChaosInjector {
    pub fn new(state: ClusterState) -> Self {
        Self::with_random(state, ThreadRandom::boxed())
    }

    pub fn with_random(state: ClusterState, rng: BoxedRandom) -> Self {
        Self {
            state,
            rng: Mutex::new(rng),
        }
    }

    /// Kill a random active node or a random pod, with even odds.
    ///
    /// Never creates anything. When the chosen branch has no target the
    /// cluster is left untouched and [`ChaosOutcome::NoOp`] is returned.
    pub fn unleash(&self) -> ChaosOutcome {
        let mut rng = self.rng.lock();
        let kill_node = rng.chance(0.5);

        let strike = self.state.write(|registry, now| {
            if kill_node {
                let active: Vec<NodeId> = registry
                    .nodes()
                    .iter()
                    .filter(|n| n.is_active())
                    .map(|n| n.node_id)
                    .collect();
                let Some(index) = rng.pick(active.len()) else {
                    return Strike::Miss("no active nodes to kill");
                };
                let node_id = active[index];
                let orphans = match registry.fail_node(&node_id) {
                    Ok(orphans) => orphans,
                    Err(_) => return Strike::Miss("no active nodes to kill"),
                };
                if let Some(node) = registry.nodes_mut().iter_mut().find(|n| n.node_id == node_id) {
                    node.simulate_heartbeat = false;
                }
                registry.log(now.wall, format!("Chaos Monkey: Node {} was killed", node_id));
                Strike::Node(node_id, orphans)
            } else {
                let hosts: Vec<usize> = registry
                    .nodes()
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| !n.pods.is_empty())
                    .map(|(i, _)| i)
                    .collect();
                let Some(host) = rng.pick(hosts.len()).map(|i| hosts[i]) else {
                    return Strike::Miss("no pods to kill");
                };
                let node = &mut registry.nodes_mut()[host];
                let Some(slot) = rng.pick(node.pods.len()) else {
                    return Strike::Miss("no pods to kill");
                };
                let pod = node.evict(slot);
                let node_id = node.node_id;
                registry.log(
                    now.wall,
                    format!("Chaos Monkey: Pod {} on node {} was killed", pod.name(), node_id),
                );
                Strike::Pod(node_id, pod.pod_id)
            }
        });
        drop(rng);

        let outcome = match strike {
            Strike::Node(node_id, orphans) => {
                let RescheduleReport { moved, unplaced, .. } =
                    reschedule_pods(&self.state, node_id, orphans);
                ChaosOutcome::NodeKilled {
                    node_id,
                    rescheduled: moved.len(),
                    unplaced: unplaced.len(),
                }
            }
            Strike::Pod(node_id, pod_id) => ChaosOutcome::PodKilled { node_id, pod_id },
            Strike::Miss(reason) => {
                info!(reason, "Chaos injection found no target");
                return ChaosOutcome::NoOp {
                    reason: reason.to_string(),
                };
            }
        };

        self.state.metrics().inc_chaos_kills(outcome.target());
        self.state
            .logger()
            .log_chaos(outcome.target(), &outcome.message());
        outcome
    }
}
