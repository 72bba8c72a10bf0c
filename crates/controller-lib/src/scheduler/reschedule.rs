//! Recovery of pods orphaned by a failed or removed node

use serde::Serialize;
use tracing::debug;

use super::SchedulingPolicy;
use crate::models::{NodeId, Pod, PodId};
use crate::state::ClusterState;

/// Outcome of moving a batch of orphaned pods
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RescheduleReport {
    pub source: NodeId,
    /// Pods that found a new home, with their destination
    pub moved: Vec<(PodId, NodeId)>,
    /// Pods parked in the unplaced list
    pub unplaced: Vec<PodId>,
}

impl RescheduleReport {
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty() && self.unplaced.is_empty()
    }
}

/// Re-place orphaned pods with first fit, one registry lock per pod.
///
/// The source node has already released the pods, so concurrent launches
/// may compete for the same capacity between iterations. Pods that fit
/// nowhere are journaled and parked; they are never retried.
pub fn reschedule_pods(state: &ClusterState, source: NodeId, pods: Vec<Pod>) -> RescheduleReport {
    let mut report = RescheduleReport {
        source,
        ..Default::default()
    };

    for pod in pods {
        let pod_id = pod.pod_id;
        let placed = state.write(|registry, now| {
            match registry.place(pod, SchedulingPolicy::FirstFit) {
                Ok(target) => {
                    registry.log(
                        now.wall,
                        format!(
                            "Rescheduled pod pod-{} from node {} to node {}",
                            pod_id, source, target
                        ),
                    );
                    Some(target)
                }
                Err(pod) => {
                    registry.log(
                        now.wall,
                        format!(
                            "Reschedule failure: Pod pod-{} from node {} not placed",
                            pod_id, source
                        ),
                    );
                    registry.park_unplaced(pod);
                    None
                }
            }
        });

        match placed {
            Some(target) => {
                state.metrics().inc_pods_rescheduled();
                state.logger().log_pod_rescheduled(pod_id, &source, &target);
                report.moved.push((pod_id, target));
            }
            None => {
                state.logger().log_pod_unplaced(pod_id, &source);
                report.unplaced.push(pod_id);
            }
        }
    }

    debug!(
        source = %source,
        moved = report.moved.len(),
        unplaced = report.unplaced.len(),
        "Reschedule pass complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeSpec, PodSpec};
    use crate::state::ClusterDefaults;

    fn pod(pod_id: PodId, cpu: u32, memory: u32) -> Pod {
        Pod::from_spec(pod_id, PodSpec::new(cpu, memory).unwrap())
    }

    #[test]
    fn test_reschedule_uses_first_fit() {
        let state = ClusterState::new(ClusterDefaults::default());
        let first = state.add_node(NodeSpec::new(4, 8).unwrap());
        state.add_node(NodeSpec::new(16, 32).unwrap());
        let source = uuid::Uuid::new_v4();

        let report = reschedule_pods(&state, source, vec![pod(10, 1, 1), pod(11, 2, 2)]);
        assert_eq!(report.moved, vec![(10, first), (11, first)]);
        assert!(report.unplaced.is_empty());
        assert_eq!(state.node(&first).unwrap().cpu_available, 1);
    }

    #[test]
    fn test_reschedule_parks_what_does_not_fit() {
        let state = ClusterState::new(ClusterDefaults::default());
        let target = state.add_node(NodeSpec::new(2, 4).unwrap());
        let source = uuid::Uuid::new_v4();

        let report = reschedule_pods(&state, source, vec![pod(1, 2, 2), pod(2, 2, 2)]);
        assert_eq!(report.moved, vec![(1, target)]);
        assert_eq!(report.unplaced, vec![2]);

        let unplaced = state.unplaced_pods();
        assert_eq!(unplaced.len(), 1);
        assert_eq!(unplaced[0].pod_id, 2);

        let logs = state.logs();
        assert!(logs.iter().any(|e| e.message.starts_with("Rescheduled pod pod-1")));
        assert!(logs
            .iter()
            .any(|e| e.message.starts_with("Reschedule failure: Pod pod-2")));
    }

    #[test]
    fn test_reschedule_nothing_is_empty() {
        let state = ClusterState::new(ClusterDefaults::default());
        let report = reschedule_pods(&state, uuid::Uuid::new_v4(), Vec::new());
        assert!(report.is_empty());
    }
}
