//! Cluster registry
//!
//! [`Registry`] owns every node, every placed pod, the unplaced pods and the
//! journal. [`ClusterState`] is the shared handle: one mutex guards the whole
//! registry, so each operation observes and leaves nodes with capacity
//! fields consistent with their pod lists.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{Clock, Stamp, SystemClock};
use crate::error::{ClusterError, ClusterResult};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::journal::Journal;
use crate::models::{
    ClusterSnapshot, EventLogEntry, Node, NodeId, NodeSpec, NodeStatus, Pod, PodId, PodSpec,
    UtilizationSample,
};
use crate::observability::{ClusterMetrics, StructuredLogger};
use crate::random::RandomSource;
use crate::report::{build_report, ReportRow};
use crate::scheduler::{reschedule_pods, select_node, RescheduleReport, SchedulingPolicy};
use crate::sink::SinkSender;

/// Default CPU cores of an autoscaled node
pub const DEFAULT_NODE_CPU: u32 = 8;
/// Default node memory in GB
pub const DEFAULT_NODE_MEMORY: u32 = 16;
/// Default pod memory request in GB
pub const DEFAULT_POD_MEMORY: u32 = 4;

/// Values applied when a request leaves a field unspecified
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterDefaults {
    pub node_cpu: u32,
    pub node_memory: u32,
    pub pod_memory: u32,
    pub history_limit: usize,
}

impl Default for ClusterDefaults {
    fn default() -> Self {
        Self {
            node_cpu: DEFAULT_NODE_CPU,
            node_memory: DEFAULT_NODE_MEMORY,
            pod_memory: DEFAULT_POD_MEMORY,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Result of a successful pod launch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub pod_id: PodId,
    pub node_id: NodeId,
    pub policy: SchedulingPolicy,
}

/// Node and pod counts at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterShape {
    pub active_nodes: usize,
    pub failed_nodes: usize,
    pub pods: usize,
    pub unplaced_pods: usize,
}

/// A node that just transitioned to failed, with the pods it lost
#[derive(Debug)]
pub struct FailedNode {
    pub node_id: NodeId,
    pub orphans: Vec<Pod>,
}

/// All nodes and pods, guarded as one unit by [`ClusterState`]
#[derive(Debug)]
pub struct Registry {
    nodes: Vec<Node>,
    unplaced: Vec<Pod>,
    journal: Journal,
    next_pod_id: PodId,
}

impl Registry {
    fn new(history_limit: usize) -> Self {
        Self {
            nodes: Vec::new(),
            unplaced: Vec::new(),
            journal: Journal::new(history_limit),
            next_pod_id: 1,
        }
    }

    /// Nodes in registration order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.node_id == node_id)
    }

    fn node_mut(&mut self, node_id: &NodeId) -> ClusterResult<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| &n.node_id == node_id)
            .ok_or(ClusterError::NotFound(*node_id))
    }

    /// Pods that failed rescheduling, oldest first
    pub fn unplaced(&self) -> &[Pod] {
        &self.unplaced
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Append an event to the journal
    pub fn log(&mut self, now: DateTime<Utc>, message: impl Into<String>) {
        self.journal.record_event(now, message);
    }

    /// Used over total CPU across active nodes, 0 when there is no capacity
    pub fn utilization(&self) -> f64 {
        let (used, total) = self
            .nodes
            .iter()
            .filter(|n| n.is_active())
            .fold((0u64, 0u64), |(used, total), n| {
                (used + n.cpu_used() as u64, total + n.cpu_total as u64)
            });

        if total == 0 {
            0.0
        } else {
            used as f64 / total as f64
        }
    }

    pub fn shape(&self) -> ClusterShape {
        let mut shape = ClusterShape {
            unplaced_pods: self.unplaced.len(),
            ..Default::default()
        };
        for node in &self.nodes {
            match node.status {
                NodeStatus::Active => shape.active_nodes += 1,
                NodeStatus::Failed => shape.failed_nodes += 1,
            }
            shape.pods += node.pods.len();
        }
        shape
    }

    /// Register a node and record it in the journal
    pub fn add_node(&mut self, spec: NodeSpec, now: Stamp) -> NodeId {
        let node_id = self.insert_node(spec, now);
        let node = &self.nodes[self.nodes.len() - 1];
        let message = format!(
            "Added node {} with {} CPU, {}GB Memory, Type: {}, Network Group: {}",
            node_id, node.cpu_total, node.memory_total, node.node_type, node.network_group
        );
        self.log(now.wall, message);
        node_id
    }

    /// Register a node without journaling; callers log their own event
    pub(crate) fn insert_node(&mut self, spec: NodeSpec, now: Stamp) -> NodeId {
        let node = Node::new(spec, now);
        let node_id = node.node_id;
        self.nodes.push(node);
        node_id
    }

    /// Unregister a node, handing back the pods it hosted
    pub fn remove_node(&mut self, node_id: &NodeId, now: Stamp) -> ClusterResult<Vec<Pod>> {
        let index = self
            .nodes
            .iter()
            .position(|n| &n.node_id == node_id)
            .ok_or(ClusterError::NotFound(*node_id))?;

        let mut node = self.nodes.remove(index);
        let orphans = node.detach_pods();
        self.log(now.wall, format!("Removed node {}", node_id));
        Ok(orphans)
    }

    /// Refresh a node's heartbeat; returns `true` if it was reactivated
    pub fn heartbeat(&mut self, node_id: &NodeId, now: Stamp) -> ClusterResult<bool> {
        let node = self.node_mut(node_id)?;
        node.touch_heartbeat(now);

        if node.status == NodeStatus::Failed {
            node.status = NodeStatus::Active;
            self.log(now.wall, format!("Node {} reactivated after heartbeat", node_id));
            return Ok(true);
        }
        Ok(false)
    }

    pub fn set_simulation(
        &mut self,
        node_id: &NodeId,
        simulate: bool,
        now: Stamp,
    ) -> ClusterResult<()> {
        self.node_mut(node_id)?.simulate_heartbeat = simulate;
        self.log(
            now.wall,
            format!("Simulation for node {} set to {}", node_id, simulate),
        );
        Ok(())
    }

    /// Allocate the next pod id
    pub fn next_pod_id(&mut self) -> PodId {
        let id = self.next_pod_id;
        self.next_pod_id += 1;
        id
    }

    /// Place a pod on the node chosen by `policy` without journaling.
    ///
    /// On failure the pod is handed back untouched.
    pub fn place(&mut self, pod: Pod, policy: SchedulingPolicy) -> Result<NodeId, Pod> {
        let Some(index) = select_node(&self.nodes, &pod, policy) else {
            return Err(pod);
        };

        let node = &mut self.nodes[index];
        node.assign(pod);
        Ok(node.node_id)
    }

    /// Place a new pod and journal the decision
    pub fn schedule(
        &mut self,
        pod: Pod,
        policy: SchedulingPolicy,
        now: Stamp,
    ) -> Result<NodeId, Pod> {
        let pod_id = pod.pod_id;
        let node_id = self.place(pod, policy)?;
        self.log(
            now.wall,
            format!("Pod pod-{} scheduled on node {} using {}", pod_id, node_id, policy),
        );
        Ok(node_id)
    }

    /// Keep a pod that could not be placed anywhere
    pub fn park_unplaced(&mut self, pod: Pod) {
        self.unplaced.push(pod);
    }

    /// Mark a node failed and detach its pods.
    ///
    /// Returns an empty list if the node was already failed.
    pub(crate) fn fail_node(&mut self, node_id: &NodeId) -> ClusterResult<Vec<Pod>> {
        let node = self.node_mut(node_id)?;
        if node.status == NodeStatus::Failed {
            return Ok(Vec::new());
        }
        node.status = NodeStatus::Failed;
        Ok(node.detach_pods())
    }

    /// Fail every active node whose last heartbeat is older than `threshold`.
    ///
    /// Ages are measured on the monotonic clock.
    pub fn expire_heartbeats(&mut self, now: Stamp, threshold: Duration) -> Vec<FailedNode> {
        let expired: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.is_active())
            .filter(|n| n.heartbeat_age(now.instant) > threshold)
            .map(|n| n.node_id)
            .collect();

        let mut failed = Vec::with_capacity(expired.len());
        for node_id in expired {
            if let Ok(orphans) = self.fail_node(&node_id) {
                self.log(now.wall, format!("Health Monitor: Node {} marked as FAILED", node_id));
                failed.push(FailedNode { node_id, orphans });
            }
        }
        failed
    }

    /// Refresh heartbeats of simulated nodes; returns how many were touched
    pub fn refresh_simulated_heartbeats(&mut self, now: Stamp) -> usize {
        let mut refreshed = 0;
        for node in self.nodes.iter_mut().filter(|n| n.simulate_heartbeat) {
            node.touch_heartbeat(now);
            refreshed += 1;
        }
        refreshed
    }

    /// Resample synthetic CPU usage of pods on active nodes
    pub fn refresh_pod_usage(&mut self, rng: &mut dyn RandomSource) {
        for node in self.nodes.iter_mut().filter(|n| n.is_active()) {
            for pod in &mut node.pods {
                let usage = rng.between(0.5, 1.0) * pod.cpu as f64;
                pod.cpu_usage = (usage * 100.0).round() / 100.0;
            }
        }
    }

    /// Sample current utilization into the journal
    pub fn record_utilization(&mut self, now: Stamp) -> UtilizationSample {
        let utilization = self.utilization();
        self.journal.record_sample(now.wall, utilization)
    }

    pub fn snapshot(&self, now: Stamp) -> ClusterSnapshot {
        ClusterSnapshot {
            taken_at: now.wall,
            utilization: self.utilization(),
            nodes: self.nodes.clone(),
            unplaced: self.unplaced.clone(),
            logs: self.journal.events(),
            history: self.journal.samples(),
        }
    }
}

/// Shared handle to the cluster registry
#[derive(Clone)]
pub struct ClusterState {
    registry: Arc<Mutex<Registry>>,
    clock: Arc<dyn Clock>,
    defaults: ClusterDefaults,
    metrics: ClusterMetrics,
    logger: StructuredLogger,
}

impl ClusterState {
    pub fn new(defaults: ClusterDefaults) -> Self {
        Self::with_clock(defaults, Arc::new(SystemClock))
    }

    pub fn with_clock(defaults: ClusterDefaults, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::new(defaults.history_limit))),
            clock,
            defaults,
            metrics: ClusterMetrics::new(),
            logger: StructuredLogger::new("cluster"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Mirror the journal to a durable sink writer
    pub fn attach_sink(&self, sink: SinkSender) {
        self.registry.lock().journal.attach_sink(sink);
    }

    pub fn defaults(&self) -> &ClusterDefaults {
        &self.defaults
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn metrics(&self) -> &ClusterMetrics {
        &self.metrics
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Run `f` with exclusive access to the registry.
    ///
    /// The clock is read after the lock is taken, so journal order and
    /// timestamps agree.
    pub fn write<R>(&self, f: impl FnOnce(&mut Registry, Stamp) -> R) -> R {
        let mut registry = self.registry.lock();
        let now = self.clock.stamp();
        f(&mut registry, now)
    }

    /// Run `f` with a consistent view of the registry
    pub fn read<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        let registry = self.registry.lock();
        f(&registry)
    }

    pub fn add_node(&self, spec: NodeSpec) -> NodeId {
        let node_id = self.write(|registry, now| registry.add_node(spec, now));
        info!(node_id = %node_id, "Node added");
        node_id
    }

    /// Remove a node and move its pods elsewhere with first fit
    pub fn remove_node(&self, node_id: &NodeId) -> ClusterResult<RescheduleReport> {
        let orphans = self.write(|registry, now| registry.remove_node(node_id, now))?;
        info!(node_id = %node_id, orphans = orphans.len(), "Node removed");
        Ok(reschedule_pods(self, *node_id, orphans))
    }

    pub fn list_nodes(&self) -> Vec<Node> {
        self.read(|registry| registry.nodes().to_vec())
    }

    pub fn node(&self, node_id: &NodeId) -> Option<Node> {
        self.read(|registry| registry.node(node_id).cloned())
    }

    /// Record a heartbeat; returns `true` if a failed node came back
    pub fn set_heartbeat(&self, node_id: &NodeId) -> ClusterResult<bool> {
        let reactivated = self.write(|registry, now| registry.heartbeat(node_id, now))?;
        if reactivated {
            info!(node_id = %node_id, "Node reactivated by heartbeat");
        } else {
            debug!(node_id = %node_id, "Heartbeat received");
        }
        Ok(reactivated)
    }

    pub fn set_simulation(&self, node_id: &NodeId, simulate: bool) -> ClusterResult<()> {
        self.write(|registry, now| registry.set_simulation(node_id, simulate, now))
    }

    pub fn cluster_utilization(&self) -> f64 {
        self.read(Registry::utilization)
    }

    /// Create a pod and place it with `policy`
    pub fn launch_pod(&self, spec: PodSpec, policy: SchedulingPolicy) -> ClusterResult<Placement> {
        let result = self.write(|registry, now| {
            let pod = Pod::from_spec(registry.next_pod_id(), spec);
            let pod_id = pod.pod_id;
            registry
                .schedule(pod, policy, now)
                .map(|node_id| Placement {
                    pod_id,
                    node_id,
                    policy,
                })
                .map_err(|_| ClusterError::NoCapacity { pod_id })
        });

        match &result {
            Ok(placement) => {
                self.metrics.inc_pods_scheduled(policy.as_str());
                info!(
                    pod_id = placement.pod_id,
                    node_id = %placement.node_id,
                    policy = %policy,
                    "Pod launched"
                );
            }
            Err(e) => {
                self.metrics.inc_scheduling_failures();
                info!(error = %e, policy = %policy, "Pod launch rejected");
            }
        }
        result
    }

    pub fn logs(&self) -> Vec<EventLogEntry> {
        self.read(|registry| registry.journal().events())
    }

    pub fn utilization_history(&self) -> Vec<UtilizationSample> {
        self.read(|registry| registry.journal().samples())
    }

    pub fn unplaced_pods(&self) -> Vec<Pod> {
        self.read(|registry| registry.unplaced().to_vec())
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        self.write(|registry, now| registry.snapshot(now))
    }

    /// Tabular summary of every node
    pub fn report(&self) -> Vec<ReportRow> {
        self.read(|registry| build_report(registry.nodes()))
    }

    /// Push node and pod counts into the metrics gauges
    pub fn publish_shape(&self) {
        let (shape, utilization) = self.read(|registry| (registry.shape(), registry.utilization()));
        self.metrics.set_cluster_shape(
            shape.active_nodes as i64,
            shape.failed_nodes as i64,
            shape.pods as i64,
            shape.unplaced_pods as i64,
        );
        self.metrics.set_utilization(utilization);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::NodeType;
    use crate::random::ScriptedRandom;

    fn state() -> (ClusterState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (
            ClusterState::with_clock(ClusterDefaults::default(), clock.clone()),
            clock,
        )
    }

    fn spec(cpu: u32, memory: u32) -> NodeSpec {
        NodeSpec::new(cpu, memory).unwrap()
    }

    fn pod(cpu: u32, memory: u32) -> PodSpec {
        PodSpec::new(cpu, memory).unwrap()
    }

    fn assert_capacity_invariant(state: &ClusterState) {
        for node in state.list_nodes() {
            let cpu: u32 = node.pods.iter().map(|p| p.cpu).sum();
            let memory: u32 = node.pods.iter().map(|p| p.memory).sum();
            assert!(node.cpu_available <= node.cpu_total);
            assert!(node.memory_available <= node.memory_total);
            assert_eq!(node.cpu_available + cpu, node.cpu_total);
            assert_eq!(node.memory_available + memory, node.memory_total);
        }
    }

    #[test]
    fn test_launch_on_empty_cluster_has_no_capacity() {
        let (state, _) = state();
        let err = state
            .launch_pod(pod(1, 1), SchedulingPolicy::FirstFit)
            .unwrap_err();
        assert!(matches!(err, ClusterError::NoCapacity { .. }));
    }

    #[test]
    fn test_launch_decrements_capacity() {
        let (state, _) = state();
        let node_a = state.add_node(spec(8, 16));

        let placement = state
            .launch_pod(pod(2, 4), SchedulingPolicy::FirstFit)
            .unwrap();
        assert_eq!(placement.node_id, node_a);
        assert_eq!(placement.pod_id, 1);

        let node = state.node(&node_a).unwrap();
        assert_eq!(node.cpu_available, 6);
        assert_eq!(node.memory_available, 12);
        assert_eq!(node.pods.len(), 1);
        assert_capacity_invariant(&state);
    }

    #[test]
    fn test_pod_ids_are_monotonic_even_on_failure() {
        let (state, _) = state();
        state.add_node(spec(2, 2));

        let first = state.launch_pod(pod(1, 1), SchedulingPolicy::FirstFit).unwrap();
        let rejected = state.launch_pod(pod(4, 1), SchedulingPolicy::FirstFit);
        let third = state.launch_pod(pod(1, 1), SchedulingPolicy::FirstFit).unwrap();

        assert_eq!(first.pod_id, 1);
        assert_eq!(rejected, Err(ClusterError::NoCapacity { pod_id: 2 }));
        assert_eq!(third.pod_id, 3);
    }

    #[test]
    fn test_policy_selection_end_to_end() {
        let (state, _) = state();
        let small = state.add_node(spec(2, 2));
        let large = state.add_node(spec(5, 5));

        let best = state.launch_pod(pod(1, 1), SchedulingPolicy::BestFit).unwrap();
        assert_eq!(best.node_id, small);

        let worst = state.launch_pod(pod(1, 1), SchedulingPolicy::WorstFit).unwrap();
        assert_eq!(worst.node_id, large);

        let first = state.launch_pod(pod(1, 1), SchedulingPolicy::FirstFit).unwrap();
        assert_eq!(first.node_id, small);
        assert_capacity_invariant(&state);
    }

    #[test]
    fn test_unknown_node_operations() {
        let (state, _) = state();
        let missing = uuid::Uuid::new_v4();
        assert_eq!(state.set_heartbeat(&missing), Err(ClusterError::NotFound(missing)));
        assert_eq!(
            state.set_simulation(&missing, false),
            Err(ClusterError::NotFound(missing))
        );
        assert!(matches!(
            state.remove_node(&missing),
            Err(ClusterError::NotFound(id)) if id == missing
        ));
    }

    #[test]
    fn test_utilization_counts_active_nodes_only() {
        let (state, _) = state();
        assert_eq!(state.cluster_utilization(), 0.0);

        let a = state.add_node(spec(4, 16));
        state.add_node(spec(4, 16));
        state.launch_pod(pod(2, 1), SchedulingPolicy::FirstFit).unwrap();
        assert!((state.cluster_utilization() - 0.25).abs() < f64::EPSILON);

        state.write(|registry, _| registry.fail_node(&a)).unwrap();
        assert_eq!(state.cluster_utilization(), 0.0);
    }

    #[test]
    fn test_remove_node_moves_pods() {
        let (state, _) = state();
        let a = state.add_node(spec(8, 16));
        let b = state.add_node(spec(8, 16));
        state.launch_pod(pod(2, 4), SchedulingPolicy::FirstFit).unwrap();

        let report = state.remove_node(&a).unwrap();
        assert_eq!(report.moved.len(), 1);
        assert_eq!(report.moved[0].1, b);
        assert!(report.unplaced.is_empty());
        assert!(state.node(&a).is_none());
        assert_eq!(state.node(&b).unwrap().pods.len(), 1);
        assert_capacity_invariant(&state);
    }

    #[test]
    fn test_remove_last_node_parks_pods() {
        let (state, _) = state();
        let a = state.add_node(spec(8, 16));
        state.launch_pod(pod(2, 4), SchedulingPolicy::FirstFit).unwrap();

        let report = state.remove_node(&a).unwrap();
        assert_eq!(report.unplaced, vec![1]);
        assert_eq!(state.unplaced_pods().len(), 1);
        assert!(state
            .logs()
            .iter()
            .any(|e| e.message.contains("not placed")));
    }

    #[test]
    fn test_heartbeat_reactivates_failed_node() {
        let (state, clock) = state();
        let a = state.add_node(spec(8, 16));
        state.write(|registry, _| registry.fail_node(&a)).unwrap();

        clock.advance(Duration::from_secs(30));
        assert_eq!(state.set_heartbeat(&a), Ok(true));
        let node = state.node(&a).unwrap();
        assert_eq!(node.status, NodeStatus::Active);
        assert_eq!(node.last_heartbeat, clock.now());
        assert_eq!(state.set_heartbeat(&a), Ok(false));
    }

    #[test]
    fn test_expire_heartbeats_respects_threshold() {
        let (state, clock) = state();
        let a = state.add_node(spec(8, 16));
        let threshold = Duration::from_secs(15);

        clock.advance(Duration::from_secs(15));
        let failed = state.write(|registry, now| registry.expire_heartbeats(now, threshold));
        assert!(failed.is_empty());

        clock.advance(Duration::from_secs(1));
        let failed = state.write(|registry, now| registry.expire_heartbeats(now, threshold));
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].node_id, a);
        assert_eq!(state.node(&a).unwrap().status, NodeStatus::Failed);
    }

    #[test]
    fn test_expiry_ignores_wall_clock_steps() {
        let (state, clock) = state();
        let a = state.add_node(spec(8, 16));
        let threshold = Duration::from_secs(15);
        let start = clock.now();

        // Forward step: no real silence, nothing fails
        clock.set(start + chrono::Duration::minutes(10));
        let failed = state.write(|registry, now| registry.expire_heartbeats(now, threshold));
        assert!(failed.is_empty());

        // Backward step: real silence still fails the node
        clock.set(start - chrono::Duration::minutes(10));
        clock.advance(Duration::from_secs(16));
        let failed = state.write(|registry, now| registry.expire_heartbeats(now, threshold));
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].node_id, a);
    }

    #[test]
    fn test_simulated_heartbeats_only_touch_simulated_nodes() {
        let (state, clock) = state();
        let simulated = state.add_node(spec(8, 16));
        let manual = state.add_node(spec(8, 16).with_simulated_heartbeat(false));
        let start = clock.now();

        clock.advance(Duration::from_secs(7));
        let refreshed = state.write(|registry, now| registry.refresh_simulated_heartbeats(now));
        assert_eq!(refreshed, 1);
        assert_eq!(state.node(&simulated).unwrap().last_heartbeat, clock.now());
        assert_eq!(state.node(&manual).unwrap().last_heartbeat, start);
    }

    #[test]
    fn test_pod_usage_within_request() {
        let (state, _) = state();
        state.add_node(spec(8, 16).with_node_type(NodeType::HighCpu));
        state.launch_pod(pod(4, 1), SchedulingPolicy::FirstFit).unwrap();

        let mut rng = ScriptedRandom::new(vec![0.0, 0.5, 0.999]);
        for _ in 0..3 {
            state.write(|registry, _| registry.refresh_pod_usage(&mut rng));
            let usage = state.list_nodes()[0].pods[0].cpu_usage;
            assert!((2.0..=4.0).contains(&usage));
        }
    }

    #[test]
    fn test_mutations_are_journaled_and_bounded() {
        let (state, _) = state();
        let a = state.add_node(spec(8, 16));
        for _ in 0..100 {
            state.set_simulation(&a, false).unwrap();
        }
        let logs = state.logs();
        assert_eq!(logs.len(), DEFAULT_HISTORY_LIMIT);
        assert!(logs.iter().all(|e| e.message.contains("Simulation for node")));
    }

    #[test]
    fn test_snapshot_is_consistent() {
        let (state, _) = state();
        state.add_node(spec(8, 16));
        state.launch_pod(pod(2, 4), SchedulingPolicy::FirstFit).unwrap();
        state.write(|registry, now| registry.record_utilization(now));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.nodes[0].pods.len(), 1);
        assert_eq!(snapshot.history.len(), 1);
        assert!((snapshot.utilization - 0.25).abs() < f64::EPSILON);
        assert_eq!(snapshot.logs.len(), 2);
    }
}
