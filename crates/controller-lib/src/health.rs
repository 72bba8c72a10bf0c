//! Component health for the control plane
//!
//! Each background loop and the durable sink reports here after every
//! tick or write. `/healthz` folds the per-component states into one
//! status; `/readyz` additionally requires the loops to have been spawned.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Ordered from best to worst so the overall status is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still running, last tick or write failed
    Degraded,
    Unhealthy,
}

/// Last reported state of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// Failures reported since the last healthy report
    pub consecutive_failures: u32,
}

impl ComponentHealth {
    fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            updated_at: Utc::now(),
            consecutive_failures: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Names under which components report
pub mod components {
    pub const HEALTH_MONITOR: &str = "health_monitor";
    pub const AUTOSCALER: &str = "autoscaler";
    pub const HEARTBEAT_SIMULATOR: &str = "heartbeat_simulator";
    pub const UTILIZATION_RECORDER: &str = "utilization_recorder";
    pub const STATE_BROADCASTER: &str = "state_broadcaster";
    pub const DURABLE_SINK: &str = "durable_sink";

    pub const ALL: [&str; 6] = [
        HEALTH_MONITOR,
        AUTOSCALER,
        HEARTBEAT_SIMULATOR,
        UTILIZATION_RECORDER,
        STATE_BROADCASTER,
        DURABLE_SINK,
    ];
}

#[derive(Debug, Default)]
struct Board {
    components: BTreeMap<String, ComponentHealth>,
    loops_started: bool,
}

/// Shared health board; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    board: Arc<RwLock<Board>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `name` as healthy
    pub async fn register(&self, name: &str) {
        self.board
            .write()
            .await
            .components
            .insert(name.to_string(), ComponentHealth::healthy());
    }

    pub async fn register_all(&self) {
        let mut board = self.board.write().await;
        for name in components::ALL {
            board
                .components
                .insert(name.to_string(), ComponentHealth::healthy());
        }
    }

    pub async fn status_of(&self, name: &str) -> Option<ComponentStatus> {
        self.board
            .read()
            .await
            .components
            .get(name)
            .map(|health| health.status)
    }

    pub async fn set_healthy(&self, name: &str) {
        self.report(name, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.report(name, ComponentStatus::Degraded, Some(message.into()))
            .await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.report(name, ComponentStatus::Unhealthy, Some(message.into()))
            .await;
    }

    /// Mark the control loops as spawned (or stopping)
    pub async fn set_ready(&self, ready: bool) {
        self.board.write().await.loops_started = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let board = self.board.read().await;
        HealthResponse {
            status: overall(&board.components),
            components: board.components.clone(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let board = self.board.read().await;

        let reason = if !board.loops_started {
            Some("control loops not running".to_string())
        } else if overall(&board.components) == ComponentStatus::Unhealthy {
            let failing: Vec<&str> = board
                .components
                .iter()
                .filter(|(_, health)| health.status == ComponentStatus::Unhealthy)
                .map(|(name, _)| name.as_str())
                .collect();
            Some(format!("unhealthy: {}", failing.join(", ")))
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }

    async fn report(&self, name: &str, status: ComponentStatus, message: Option<String>) {
        let mut board = self.board.write().await;
        let entry = board
            .components
            .entry(name.to_string())
            .or_insert_with(ComponentHealth::healthy);

        entry.consecutive_failures = match status {
            ComponentStatus::Healthy => 0,
            _ => entry.consecutive_failures.saturating_add(1),
        };
        entry.status = status;
        entry.message = message;
        entry.updated_at = Utc::now();
    }
}

fn overall(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
    components
        .values()
        .map(|health| health.status)
        .max()
        .unwrap_or(ComponentStatus::Healthy)
}
