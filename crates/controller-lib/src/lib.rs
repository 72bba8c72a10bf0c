//! Control plane library for a simulated compute cluster
//!
//! This crate provides the core functionality for:
//! - Node and pod registry with a single consistency boundary
//! - Pod placement (first fit, best fit, worst fit)
//! - Heartbeat failure detection and pod rescheduling
//! - Autoscaling with cooldown
//! - Chaos injection
//! - Bounded event/utilization history mirrored to a durable sink
//! - Snapshot broadcasting, health checks and observability

pub mod chaos;
pub mod clock;
pub mod control;
pub mod error;
pub mod health;
pub mod history;
pub mod journal;
pub mod models;
pub mod observability;
pub mod random;
pub mod report;
pub mod scheduler;
pub mod sink;
pub mod state;

pub use chaos::{ChaosInjector, ChaosOutcome};
pub use control::{
    AutoScaler, AutoScalerConfig, ClusterEvent, ControlLoops, EventHub, HealthMonitor,
    HealthMonitorConfig, LoopIntervals, StateBroadcaster,
};
pub use error::{ClusterError, ClusterResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ClusterMetrics, StructuredLogger};
pub use report::{render_csv, ReportRow};
pub use scheduler::{RescheduleReport, SchedulingPolicy};
pub use state::{ClusterDefaults, ClusterState, Placement};
