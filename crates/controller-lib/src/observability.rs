//! Observability infrastructure for the control plane
//!
//! Provides:
//! - Prometheus metrics (cluster shape, scheduling outcomes, failure
//!   recovery, autoscaling, chaos, sink health, loop latency)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Gauge, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::models::{NodeId, NodeType, PodId};

/// Default histogram buckets for loop tick latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ClusterMetricsInner> = OnceLock::new();

struct ClusterMetricsInner {
    nodes: IntGaugeVec,
    pods_running: IntGauge,
    pods_unplaced: IntGauge,
    utilization: Gauge,
    pods_scheduled: IntCounterVec,
    scheduling_failures: IntCounter,
    pods_rescheduled: IntCounter,
    nodes_failed: IntCounter,
    autoscale_events: IntCounter,
    chaos_kills: IntCounterVec,
    sink_errors: IntCounter,
    snapshots_broadcast: IntCounter,
    loop_tick_seconds: HistogramVec,
}

impl ClusterMetricsInner {
    fn new() -> Self {
        Self {
            nodes: register_int_gauge_vec!(
                "cluster_nodes",
                "Number of registered nodes by status",
                &["status"]
            )
            .expect("Failed to register cluster_nodes"),

            pods_running: register_int_gauge!(
                "cluster_pods_running",
                "Number of pods currently assigned to a node"
            )
            .expect("Failed to register cluster_pods_running"),

            pods_unplaced: register_int_gauge!(
                "cluster_pods_unplaced",
                "Number of pods that could not be rescheduled"
            )
            .expect("Failed to register cluster_pods_unplaced"),

            utilization: register_gauge!(
                "cluster_cpu_utilization_ratio",
                "Used over total CPU across active nodes"
            )
            .expect("Failed to register cluster_cpu_utilization_ratio"),

            pods_scheduled: register_int_counter_vec!(
                "cluster_pods_scheduled_total",
                "Pods placed on a node, by scheduling policy",
                &["policy"]
            )
            .expect("Failed to register cluster_pods_scheduled_total"),

            scheduling_failures: register_int_counter!(
                "cluster_scheduling_failures_total",
                "Pod launches rejected for lack of an eligible node"
            )
            .expect("Failed to register cluster_scheduling_failures_total"),

            pods_rescheduled: register_int_counter!(
                "cluster_pods_rescheduled_total",
                "Pods moved off a failed or removed node"
            )
            .expect("Failed to register cluster_pods_rescheduled_total"),

            nodes_failed: register_int_counter!(
                "cluster_nodes_failed_total",
                "Nodes transitioned to failed by missed heartbeats"
            )
            .expect("Failed to register cluster_nodes_failed_total"),

            autoscale_events: register_int_counter!(
                "cluster_autoscale_events_total",
                "Nodes added by the autoscaler"
            )
            .expect("Failed to register cluster_autoscale_events_total"),

            chaos_kills: register_int_counter_vec!(
                "cluster_chaos_kills_total",
                "Targets destroyed by chaos injection",
                &["target"]
            )
            .expect("Failed to register cluster_chaos_kills_total"),

            sink_errors: register_int_counter!(
                "cluster_sink_errors_total",
                "Failed writes to the durable sink"
            )
            .expect("Failed to register cluster_sink_errors_total"),

            snapshots_broadcast: register_int_counter!(
                "cluster_snapshots_broadcast_total",
                "State snapshots pushed to subscribers"
            )
            .expect("Failed to register cluster_snapshots_broadcast_total"),

            loop_tick_seconds: register_histogram_vec!(
                "cluster_loop_tick_seconds",
                "Time spent in one tick of a background loop",
                &["loop"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cluster_loop_tick_seconds"),
        }
    }
}

/// Cluster metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ClusterMetrics {
    _private: (),
}

impl Default for ClusterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClusterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClusterMetrics")
    }
}

impl ClusterMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ClusterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ClusterMetricsInner {
        GLOBAL_METRICS.get_or_init(ClusterMetricsInner::new)
    }

    /// Update the cluster shape gauges
    pub fn set_cluster_shape(&self, active: i64, failed: i64, pods: i64, unplaced: i64) {
        let inner = self.inner();
        inner.nodes.with_label_values(&["active"]).set(active);
        inner.nodes.with_label_values(&["failed"]).set(failed);
        inner.pods_running.set(pods);
        inner.pods_unplaced.set(unplaced);
    }

    pub fn set_utilization(&self, utilization: f64) {
        self.inner().utilization.set(utilization);
    }

    pub fn inc_pods_scheduled(&self, policy: &str) {
        self.inner()
            .pods_scheduled
            .with_label_values(&[policy])
            .inc();
    }

    pub fn inc_scheduling_failures(&self) {
        self.inner().scheduling_failures.inc();
    }

    pub fn inc_pods_rescheduled(&self) {
        self.inner().pods_rescheduled.inc();
    }

    pub fn inc_nodes_failed(&self) {
        self.inner().nodes_failed.inc();
    }

    pub fn inc_autoscale_events(&self) {
        self.inner().autoscale_events.inc();
    }

    pub fn inc_chaos_kills(&self, target: &str) {
        self.inner().chaos_kills.with_label_values(&[target]).inc();
    }

    pub fn inc_sink_errors(&self) {
        self.inner().sink_errors.inc();
    }

    pub fn inc_snapshots_broadcast(&self) {
        self.inner().snapshots_broadcast.inc();
    }

    /// Record how long one tick of a loop took
    pub fn observe_tick(&self, loop_name: &str, duration_secs: f64) {
        self.inner()
            .loop_tick_seconds
            .with_label_values(&[loop_name])
            .observe(duration_secs);
    }
}

/// Structured logger for control plane events
///
/// Emits consistent JSON-friendly fields for the lifecycle events an
/// operator wants to grep for.
#[derive(Clone, Debug)]
pub struct StructuredLogger {
    cluster_name: String,
}

impl StructuredLogger {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, api_port: u16) {
        info!(
            event = "controller_started",
            cluster = %self.cluster_name,
            version = %version,
            api_port = api_port,
            "Cluster controller started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "controller_shutdown",
            cluster = %self.cluster_name,
            reason = %reason,
            "Cluster controller shutting down"
        );
    }

    pub fn log_node_failed(&self, node_id: &NodeId, orphaned_pods: usize) {
        warn!(
            event = "node_failed",
            cluster = %self.cluster_name,
            node_id = %node_id,
            orphaned_pods = orphaned_pods,
            "Node missed heartbeats and was marked failed"
        );
    }

    pub fn log_pod_rescheduled(&self, pod_id: PodId, from: &NodeId, to: &NodeId) {
        info!(
            event = "pod_rescheduled",
            cluster = %self.cluster_name,
            pod_id = pod_id,
            from_node = %from,
            to_node = %to,
            "Pod rescheduled"
        );
    }

    pub fn log_pod_unplaced(&self, pod_id: PodId, from: &NodeId) {
        warn!(
            event = "pod_unplaced",
            cluster = %self.cluster_name,
            pod_id = pod_id,
            from_node = %from,
            "No eligible node for orphaned pod"
        );
    }

    pub fn log_scale_up(
        &self,
        node_id: &NodeId,
        utilization: f64,
        node_type: NodeType,
        network_group: &str,
    ) {
        info!(
            event = "autoscaled",
            cluster = %self.cluster_name,
            node_id = %node_id,
            utilization = utilization,
            node_type = %node_type,
            network_group = %network_group,
            "Added node under load"
        );
    }

    pub fn log_chaos(&self, target: &str, description: &str) {
        warn!(
            event = "chaos_injected",
            cluster = %self.cluster_name,
            target = %target,
            description = %description,
            "Chaos injection"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_metrics_creation() {
        // Prometheus uses a process-global registry; handles share it.
        let metrics = ClusterMetrics::new();
        let again = ClusterMetrics::new();

        metrics.set_cluster_shape(3, 1, 7, 0);
        metrics.set_utilization(0.5);
        metrics.inc_pods_scheduled("best_fit");
        again.inc_scheduling_failures();
        again.inc_chaos_kills("node");
        metrics.observe_tick("health_monitor", 0.0001);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-cluster");
        assert_eq!(logger.cluster_name, "test-cluster");
    }
}
