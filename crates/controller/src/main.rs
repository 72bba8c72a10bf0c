//! Cluster controller - simulated compute-cluster control plane
//!
//! Serves the node/pod request surface over HTTP, pushes state over a
//! WebSocket and runs the health, autoscaling, heartbeat, sampling and
//! broadcast loops until interrupted.

use std::sync::Arc;

use anyhow::Result;
use cluster_controller::{api, config::ControllerConfig};
use controller_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    sink::{self, DurableSink, MemorySink, SinkWriter, SqliteSink},
    ChaosInjector, ClusterState, ControlLoops, EventHub,
};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting cluster-controller");

    let config = ControllerConfig::load()?;
    info!(
        cluster = %config.cluster_name,
        database = %config.database_path,
        "Controller configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let logger = StructuredLogger::new(&config.cluster_name);
    let cluster = ClusterState::new(config.defaults()).with_logger(logger.clone());
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Durable sink; fall back to memory so the journal keeps flowing
    let durable: Arc<dyn DurableSink> = match SqliteSink::open(&config.database_path) {
        Ok(sqlite) => Arc::new(sqlite),
        Err(e) => {
            warn!(
                error = %e,
                path = %config.database_path,
                capacity = sink::DEFAULT_MEMORY_CAPACITY,
                "Cannot open SQLite sink, using bounded memory sink"
            );
            health_registry
                .set_degraded(components::DURABLE_SINK, format!("sqlite unavailable: {}", e))
                .await;
            Arc::new(MemorySink::new())
        }
    };
    let (sink_tx, sink_rx) = sink::channel();
    cluster.attach_sink(sink_tx);
    let writer = SinkWriter::new(
        durable,
        sink_rx,
        health_registry.clone(),
        cluster.metrics().clone(),
    );
    let writer_handle = tokio::spawn(writer.run(shutdown_tx.subscribe()));

    let hub = EventHub::new();
    let loop_handles = ControlLoops::new(cluster.clone(), hub.clone(), health_registry.clone())
        .with_intervals(config.intervals())
        .with_health_monitor(config.health_monitor())
        .with_autoscaler(config.autoscaler())
        .spawn(&shutdown_tx);

    let chaos = Arc::new(ChaosInjector::new(cluster.clone()));
    let app_state = Arc::new(api::AppState::new(
        cluster.clone(),
        chaos,
        hub,
        health_registry.clone(),
    ));

    health_registry.set_ready(true).await;
    logger.log_startup(CONTROLLER_VERSION, config.api_port);

    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server exited"),
                Ok(Err(e)) => {
                    warn!(error = %e, "API server failed");
                    logger.log_shutdown("API server failed");
                }
                Err(e) => warn!(error = %e, "API server task panicked"),
            }
        }
    }

    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());
    for handle in loop_handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Control loop task failed");
        }
    }
    if let Err(e) = writer_handle.await {
        warn!(error = %e, "Sink writer task failed");
    }

    info!("Shutdown complete");
    Ok(())
}
