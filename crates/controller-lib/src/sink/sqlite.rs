//! SQLite-backed durable sink

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::debug;

use super::{DurableSink, SinkError};
use crate::models::{EventLogEntry, UtilizationSample};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Appends events and samples to two SQLite tables
#[derive(Clone)]
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    /// Open or create a sink database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::with_connection(conn)
    }

    /// Open an in-memory sink (for testing)
    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SinkError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS event_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                message TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS utilization_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                utilization REAL NOT NULL
            );
            "#,
        )?;
        debug!("Sink schema initialized");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl DurableSink for SqliteSink {
    async fn append_event(&self, entry: &EventLogEntry) -> Result<(), SinkError> {
        let conn = Arc::clone(&self.conn);
        let timestamp = entry.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let message = entry.message.clone();

        tokio::task::spawn_blocking(move || {
            conn.lock().execute(
                "INSERT INTO event_logs (timestamp, message) VALUES (?1, ?2)",
                params![timestamp, message],
            )
        })
        .await??;
        Ok(())
    }

    async fn append_utilization(&self, sample: &UtilizationSample) -> Result<(), SinkError> {
        let conn = Arc::clone(&self.conn);
        let timestamp = sample.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let utilization = sample.utilization;

        tokio::task::spawn_blocking(move || {
            conn.lock().execute(
                "INSERT INTO utilization_history (timestamp, utilization) VALUES (?1, ?2)",
                params![timestamp, utilization],
            )
        })
        .await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn count(sink: &SqliteSink, table: &str) -> i64 {
        sink.conn
            .lock()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_sink_appends_events_and_samples() {
        let sink = SqliteSink::open_in_memory().unwrap();
        let now = Utc::now();

        for i in 0..3 {
            sink.append_event(&EventLogEntry {
                timestamp: now,
                message: format!("event {}", i),
            })
            .await
            .unwrap();
        }
        sink.append_utilization(&UtilizationSample {
            timestamp: now,
            utilization: 0.75,
        })
        .await
        .unwrap();

        assert_eq!(count(&sink, "event_logs"), 3);
        assert_eq!(count(&sink, "utilization_history"), 1);
    }

    #[tokio::test]
    async fn test_sqlite_sink_persists_to_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cluster.db");

        {
            let sink = SqliteSink::open(&path).unwrap();
            sink.append_event(&EventLogEntry {
                timestamp: Utc::now(),
                message: "Added node".to_string(),
            })
            .await
            .unwrap();
        }

        let reopened = SqliteSink::open(&path).unwrap();
        assert_eq!(count(&reopened, "event_logs"), 1);
        let message: String = reopened
            .conn
            .lock()
            .query_row("SELECT message FROM event_logs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(message, "Added node");
    }
}
