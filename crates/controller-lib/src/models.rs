//! Core data models for the cluster control plane

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::clock::Stamp;
use crate::error::ClusterError;

/// Node identity, generated at creation and never reused
pub type NodeId = Uuid;

/// Pod identity, monotonically increasing for the lifetime of the process
pub type PodId = u64;

/// Network group assumed when a node or pod does not name one
pub const DEFAULT_NETWORK_GROUP: &str = "default";

/// Node hardware profile, matched against pod affinity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Balanced,
    HighCpu,
    HighMem,
}

impl NodeType {
    pub const ALL: [NodeType; 3] = [NodeType::Balanced, NodeType::HighCpu, NodeType::HighMem];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Balanced => "balanced",
            NodeType::HighCpu => "high_cpu",
            NodeType::HighMem => "high_mem",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "balanced" => Ok(NodeType::Balanced),
            "high_cpu" => Ok(NodeType::HighCpu),
            "high_mem" => Ok(NodeType::HighMem),
            other => Err(ClusterError::InvalidInput(format!(
                "unknown node type '{}'",
                other
            ))),
        }
    }
}

/// Liveness state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Failed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Active => "active",
            NodeStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated request for a new node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub cpu: u32,
    pub memory: u32,
    pub node_type: NodeType,
    pub network_group: String,
    pub simulate_heartbeat: bool,
}

impl NodeSpec {
    /// Create a node spec; both capacities must be positive
    pub fn new(cpu: u32, memory: u32) -> Result<Self, ClusterError> {
        if cpu == 0 {
            return Err(ClusterError::InvalidInput(
                "node cpu must be greater than zero".to_string(),
            ));
        }
        if memory == 0 {
            return Err(ClusterError::InvalidInput(
                "node memory must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            cpu,
            memory,
            node_type: NodeType::default(),
            network_group: DEFAULT_NETWORK_GROUP.to_string(),
            simulate_heartbeat: true,
        })
    }

    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = node_type;
        self
    }

    pub fn with_network_group(mut self, group: impl Into<String>) -> Self {
        self.network_group = normalize_group(group.into());
        self
    }

    pub fn with_simulated_heartbeat(mut self, simulate: bool) -> Self {
        self.simulate_heartbeat = simulate;
        self
    }
}

/// Validated request for a new pod
#[derive(Debug, Clone, PartialEq)]
pub struct PodSpec {
    pub cpu: u32,
    pub memory: u32,
    pub network_group: String,
    pub node_affinity: Option<NodeType>,
}

impl PodSpec {
    /// Create a pod spec; the cpu request must be positive
    pub fn new(cpu: u32, memory: u32) -> Result<Self, ClusterError> {
        if cpu == 0 {
            return Err(ClusterError::InvalidInput(
                "pod cpu must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            cpu,
            memory,
            network_group: DEFAULT_NETWORK_GROUP.to_string(),
            node_affinity: None,
        })
    }

    pub fn with_network_group(mut self, group: impl Into<String>) -> Self {
        self.network_group = normalize_group(group.into());
        self
    }

    pub fn with_affinity(mut self, node_type: Option<NodeType>) -> Self {
        self.node_affinity = node_type;
        self
    }
}

fn normalize_group(group: String) -> String {
    let trimmed = group.trim();
    if trimmed.is_empty() {
        DEFAULT_NETWORK_GROUP.to_string()
    } else {
        trimmed.to_string()
    }
}

/// A simulated workload holding a fixed cpu/memory request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    pub pod_id: PodId,
    pub cpu: u32,
    pub memory: u32,
    pub network_group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeType>,
    /// Synthetic usage sample, never above `cpu`
    pub cpu_usage: f64,
}

impl Pod {
    pub fn from_spec(pod_id: PodId, spec: PodSpec) -> Self {
        Self {
            pod_id,
            cpu: spec.cpu,
            memory: spec.memory,
            network_group: spec.network_group,
            node_affinity: spec.node_affinity,
            cpu_usage: 0.0,
        }
    }

    /// Display name used in event messages and reports
    pub fn name(&self) -> String {
        format!("pod-{}", self.pod_id)
    }
}

/// A simulated machine hosting pods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: NodeId,
    pub cpu_total: u32,
    pub cpu_available: u32,
    pub memory_total: u32,
    pub memory_available: u32,
    pub node_type: NodeType,
    pub network_group: String,
    pub status: NodeStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub simulate_heartbeat: bool,
    pub pods: Vec<Pod>,
    /// Monotonic reading of the last heartbeat, used for expiry
    #[serde(skip, default = "Instant::now")]
    pub(crate) heartbeat_instant: Instant,
}

impl Node {
    pub fn new(spec: NodeSpec, now: Stamp) -> Self {
        Self {
            node_id: Uuid::new_v4(),
            cpu_total: spec.cpu,
            cpu_available: spec.cpu,
            memory_total: spec.memory,
            memory_available: spec.memory,
            node_type: spec.node_type,
            network_group: spec.network_group,
            status: NodeStatus::Active,
            last_heartbeat: now.wall,
            simulate_heartbeat: spec.simulate_heartbeat,
            pods: Vec::new(),
            heartbeat_instant: now.instant,
        }
    }

    pub(crate) fn touch_heartbeat(&mut self, now: Stamp) {
        self.last_heartbeat = now.wall;
        self.heartbeat_instant = now.instant;
    }

    /// Time since the last heartbeat on the monotonic clock
    pub fn heartbeat_age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.heartbeat_instant)
    }

    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }

    pub fn cpu_used(&self) -> u32 {
        self.cpu_total - self.cpu_available
    }

    /// Whether this node can host the pod right now
    pub fn is_eligible(&self, pod: &Pod) -> bool {
        self.is_active()
            && self.cpu_available >= pod.cpu
            && self.memory_available >= pod.memory
            && self.network_group == pod.network_group
            && pod.node_affinity.map_or(true, |affinity| affinity == self.node_type)
    }

    /// Take ownership of a pod and reserve its request.
    ///
    /// Callers must check [`Node::is_eligible`] first.
    pub(crate) fn assign(&mut self, pod: Pod) {
        debug_assert!(self.cpu_available >= pod.cpu && self.memory_available >= pod.memory);
        self.cpu_available -= pod.cpu;
        self.memory_available -= pod.memory;
        self.pods.push(pod);
    }

    /// Remove the pod at `index`, returning its request to the pool
    pub(crate) fn evict(&mut self, index: usize) -> Pod {
        let pod = self.pods.remove(index);
        self.cpu_available += pod.cpu;
        self.memory_available += pod.memory;
        pod
    }

    /// Remove every pod, restoring full capacity
    pub(crate) fn detach_pods(&mut self) -> Vec<Pod> {
        self.cpu_available = self.cpu_total;
        self.memory_available = self.memory_total;
        std::mem::take(&mut self.pods)
    }
}

/// Immutable event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl fmt::Display for EventLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.message
        )
    }
}

/// Cluster-wide utilization fraction at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilizationSample {
    pub timestamp: DateTime<Utc>,
    pub utilization: f64,
}

/// Consistent view of the cluster taken under the registry lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub taken_at: DateTime<Utc>,
    pub utilization: f64,
    pub nodes: Vec<Node>,
    pub unplaced: Vec<Pod>,
    pub logs: Vec<EventLogEntry>,
    pub history: Vec<UtilizationSample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod(cpu: u32, memory: u32) -> Pod {
        Pod::from_spec(1, PodSpec::new(cpu, memory).unwrap())
    }

    #[test]
    fn test_node_spec_rejects_zero_cpu() {
        assert!(matches!(
            NodeSpec::new(0, 16),
            Err(ClusterError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_pod_spec_blank_group_falls_back_to_default() {
        let spec = PodSpec::new(1, 1).unwrap().with_network_group("  ");
        assert_eq!(spec.network_group, DEFAULT_NETWORK_GROUP);
    }

    #[test]
    fn test_node_type_parse() {
        assert_eq!("high_mem".parse::<NodeType>().unwrap(), NodeType::HighMem);
        assert_eq!("HIGH_CPU".parse::<NodeType>().unwrap(), NodeType::HighCpu);
        assert!("gpu".parse::<NodeType>().is_err());
    }

    #[test]
    fn test_eligibility_checks_group_and_affinity() {
        let node = Node::new(
            NodeSpec::new(8, 16)
                .unwrap()
                .with_node_type(NodeType::HighMem)
                .with_network_group("isolated"),
            Stamp::now(),
        );

        assert!(!node.is_eligible(&pod(1, 1)));

        let mut isolated = pod(1, 1);
        isolated.network_group = "isolated".to_string();
        assert!(node.is_eligible(&isolated));

        isolated.node_affinity = Some(NodeType::HighCpu);
        assert!(!node.is_eligible(&isolated));

        isolated.node_affinity = Some(NodeType::HighMem);
        assert!(node.is_eligible(&isolated));
    }

    #[test]
    fn test_assign_and_detach_preserve_capacity() {
        let mut node = Node::new(NodeSpec::new(8, 16).unwrap(), Stamp::now());
        node.assign(pod(2, 4));
        node.assign(pod(3, 2));
        assert_eq!(node.cpu_available, 3);
        assert_eq!(node.memory_available, 10);
        assert_eq!(node.cpu_used(), 5);

        let evicted = node.evict(0);
        assert_eq!(evicted.cpu, 2);
        assert_eq!(node.cpu_available, 5);

        let detached = node.detach_pods();
        assert_eq!(detached.len(), 1);
        assert_eq!(node.cpu_available, node.cpu_total);
        assert_eq!(node.memory_available, node.memory_total);
        assert!(node.pods.is_empty());
    }

    #[test]
    fn test_event_entry_display() {
        let entry = EventLogEntry {
            timestamp: DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
            message: "Added node".to_string(),
        };
        assert_eq!(entry.to_string(), "[2024-01-02 03:04:05] Added node");
    }
}
