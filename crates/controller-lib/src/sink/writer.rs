//! Background task draining journal records into a durable sink

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{DurableSink, SinkReceiver, SinkRecord};
use crate::health::{components, HealthRegistry};
use crate::observability::ClusterMetrics;

pub struct SinkWriter {
    sink: Arc<dyn DurableSink>,
    rx: SinkReceiver,
    health: HealthRegistry,
    metrics: ClusterMetrics,
    degraded: bool,
    written: u64,
}

impl SinkWriter {
    pub fn new(
        sink: Arc<dyn DurableSink>,
        rx: SinkReceiver,
        health: HealthRegistry,
        metrics: ClusterMetrics,
    ) -> Self {
        Self {
            sink,
            rx,
            health,
            metrics,
            degraded: false,
            written: 0,
        }
    }

    /// Write records until shutdown or until every journal sender is gone.
    ///
    /// On shutdown, records already queued are flushed before returning.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting durable sink writer");

        loop {
            tokio::select! {
                record = self.rx.recv() => match record {
                    Some(record) => self.write(record).await,
                    None => break,
                },
                _ = shutdown.recv() => {
                    while let Ok(record) = self.rx.try_recv() {
                        self.write(record).await;
                    }
                    break;
                }
            }
        }

        info!(written = self.written, "Durable sink writer stopped");
    }

    async fn write(&mut self, record: SinkRecord) {
        match self.sink.append(&record).await {
            Ok(()) => {
                self.written += 1;
                if self.degraded {
                    info!("Durable sink recovered");
                    self.health.set_healthy(components::DURABLE_SINK).await;
                    self.degraded = false;
                }
            }
            Err(e) => {
                warn!(error = %e, record = ?record, "Failed to write record to durable sink");
                self.metrics.inc_sink_errors();
                self.health
                    .set_degraded(components::DURABLE_SINK, e.to_string())
                    .await;
                self.degraded = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use crate::models::EventLogEntry;
    use crate::sink::{self, MemorySink};
    use chrono::Utc;

    fn event(message: &str) -> SinkRecord {
        SinkRecord::Event(EventLogEntry {
            timestamp: Utc::now(),
            message: message.to_string(),
        })
    }

    #[tokio::test]
    async fn test_writer_drains_until_senders_dropped() {
        let memory = Arc::new(MemorySink::new());
        let (tx, rx) = sink::channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let writer = SinkWriter::new(
            memory.clone(),
            rx,
            HealthRegistry::new(),
            ClusterMetrics::new(),
        );

        tx.send(event("one")).unwrap();
        tx.send(event("two")).unwrap();
        drop(tx);

        writer.run(shutdown_rx).await;
        assert_eq!(memory.records().len(), 2);
    }

    #[tokio::test]
    async fn test_writer_degrades_and_recovers() {
        let memory = Arc::new(MemorySink::new());
        let health = HealthRegistry::new();
        health.register(components::DURABLE_SINK).await;

        let (_tx, rx) = sink::channel();
        let mut writer = SinkWriter::new(memory.clone(), rx, health.clone(), ClusterMetrics::new());

        memory.set_failing(true);
        writer.write(event("lost")).await;
        assert_eq!(
            health.status_of(components::DURABLE_SINK).await,
            Some(ComponentStatus::Degraded)
        );

        memory.set_failing(false);
        writer.write(event("kept")).await;
        assert_eq!(
            health.status_of(components::DURABLE_SINK).await,
            Some(ComponentStatus::Healthy)
        );
        assert_eq!(memory.records().len(), 1);
    }

    #[tokio::test]
    async fn test_writer_flushes_on_shutdown() {
        let memory = Arc::new(MemorySink::new());
        let (tx, rx) = sink::channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let writer = SinkWriter::new(memory.clone(), rx, HealthRegistry::new(), ClusterMetrics::new());

        tx.send(event("queued")).unwrap();
        shutdown_tx.send(()).unwrap();

        writer.run(shutdown_rx).await;
        assert_eq!(memory.records().len(), 1);
    }
}
