//! Controller configuration

use std::time::Duration;

use anyhow::{Context, Result};
use controller_lib::{AutoScalerConfig, ClusterDefaults, HealthMonitorConfig, LoopIntervals};
use serde::Deserialize;

/// Controller configuration, read from `CLUSTER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Name attached to structured log events
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// HTTP listen port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// SQLite file backing the durable event sink
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_heartbeat_threshold")]
    pub heartbeat_threshold_secs: u64,

    /// Health monitor and autoscaler period
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    #[serde(default = "default_heartbeat_sim_interval")]
    pub heartbeat_sim_interval_secs: u64,

    #[serde(default = "default_utilization_interval")]
    pub utilization_interval_secs: u64,

    #[serde(default = "default_broadcast_interval")]
    pub broadcast_interval_secs: u64,

    #[serde(default = "default_autoscale_threshold")]
    pub autoscale_threshold: f64,

    #[serde(default = "default_autoscale_cooldown")]
    pub autoscale_cooldown_secs: u64,

    #[serde(default = "default_node_cpu")]
    pub default_node_cpu: u32,

    #[serde(default = "default_node_memory")]
    pub default_node_memory: u32,

    #[serde(default = "default_pod_memory")]
    pub default_pod_memory: u32,

    /// In-memory bound for logs and utilization samples
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_cluster_name() -> String {
    "local".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_database_path() -> String {
    "cluster.db".to_string()
}

fn default_heartbeat_threshold() -> u64 {
    15
}

fn default_health_check_interval() -> u64 {
    5
}

fn default_heartbeat_sim_interval() -> u64 {
    7
}

fn default_utilization_interval() -> u64 {
    10
}

fn default_broadcast_interval() -> u64 {
    3
}

fn default_autoscale_threshold() -> f64 {
    0.8
}

fn default_autoscale_cooldown() -> u64 {
    60
}

fn default_node_cpu() -> u32 {
    8
}

fn default_node_memory() -> u32 {
    16
}

fn default_pod_memory() -> u32 {
    4
}

fn default_history_limit() -> usize {
    50
}

impl ControllerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let source = config::Config::builder()
            .add_source(config::Environment::with_prefix("CLUSTER").try_parsing(true))
            .build()?;
        Self::from_config(source)
    }

    pub fn from_config(source: config::Config) -> Result<Self> {
        let config: Self = source
            .try_deserialize()
            .context("invalid CLUSTER_* configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let periods = [
            ("health_check_interval_secs", self.health_check_interval_secs),
            ("heartbeat_sim_interval_secs", self.heartbeat_sim_interval_secs),
            ("utilization_interval_secs", self.utilization_interval_secs),
            ("broadcast_interval_secs", self.broadcast_interval_secs),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, secs)| *secs == 0) {
            anyhow::bail!("{} must be greater than zero", name);
        }
        if self.default_node_cpu == 0 || self.default_node_memory == 0 {
            anyhow::bail!("default node capacity must be greater than zero");
        }
        Ok(())
    }

    pub fn defaults(&self) -> ClusterDefaults {
        ClusterDefaults {
            node_cpu: self.default_node_cpu,
            node_memory: self.default_node_memory,
            pod_memory: self.default_pod_memory,
            history_limit: self.history_limit,
        }
    }

    pub fn intervals(&self) -> LoopIntervals {
        LoopIntervals {
            health_check: Duration::from_secs(self.health_check_interval_secs),
            heartbeat_simulation: Duration::from_secs(self.heartbeat_sim_interval_secs),
            utilization: Duration::from_secs(self.utilization_interval_secs),
            broadcast: Duration::from_secs(self.broadcast_interval_secs),
        }
    }

    pub fn health_monitor(&self) -> HealthMonitorConfig {
        HealthMonitorConfig {
            heartbeat_threshold: Duration::from_secs(self.heartbeat_threshold_secs),
        }
    }

    pub fn autoscaler(&self) -> AutoScalerConfig {
        AutoScalerConfig {
            threshold: self.autoscale_threshold,
            cooldown: Duration::from_secs(self.autoscale_cooldown_secs),
        }
    }
}
