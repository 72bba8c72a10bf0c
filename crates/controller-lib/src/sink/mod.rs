//! Durable, append-only sink for events and utilization samples
//!
//! The control plane never reads the sink back. Records are handed to a
//! [`SinkWriter`] through an unbounded channel so that appending to the
//! journal under the registry lock never waits on storage. Write failures
//! are logged, counted and reported through component health; they never
//! stop the writer.

mod memory;
mod sqlite;
mod writer;

pub use memory::{MemorySink, DEFAULT_MEMORY_CAPACITY};
pub use sqlite::SqliteSink;
pub use writer::SinkWriter;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::{EventLogEntry, UtilizationSample};

/// Record forwarded from the journal to the sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkRecord {
    Event(EventLogEntry),
    Utilization(UtilizationSample),
}

pub type SinkSender = mpsc::UnboundedSender<SinkRecord>;
pub type SinkReceiver = mpsc::UnboundedReceiver<SinkRecord>;

/// Create the journal-to-writer channel
pub fn channel() -> (SinkSender, SinkReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("sink task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Append-only store for audit history
#[async_trait]
pub trait DurableSink: Send + Sync {
    async fn append_event(&self, entry: &EventLogEntry) -> Result<(), SinkError>;

    async fn append_utilization(&self, sample: &UtilizationSample) -> Result<(), SinkError>;

    async fn append(&self, record: &SinkRecord) -> Result<(), SinkError> {
        match record {
            SinkRecord::Event(entry) => self.append_event(entry).await,
            SinkRecord::Utilization(sample) => self.append_utilization(sample).await,
        }
    }
}
