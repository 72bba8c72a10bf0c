//! In-memory sink, used when no database is configured and in tests
//!
//! Holds at most `capacity` records; the oldest are discarded first.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{DurableSink, SinkError, SinkRecord};
use crate::models::{EventLogEntry, UtilizationSample};

/// Records kept by [`MemorySink::new`]
pub const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub struct MemorySink {
    records: Mutex<VecDeque<SinkRecord>>,
    capacity: usize,
    dropped: AtomicU64,
    failing: AtomicBool,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero capacity is raised to one
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            dropped: AtomicU64::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records discarded to stay within capacity
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Make subsequent appends fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().iter().cloned().collect()
    }

    fn push(&self, record: SinkRecord) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("memory sink set to fail".to_string()));
        }
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        records.push_back(record);
        Ok(())
    }
}

#[async_trait]
impl DurableSink for MemorySink {
    async fn append_event(&self, entry: &EventLogEntry) -> Result<(), SinkError> {
        self.push(SinkRecord::Event(entry.clone()))
    }

    async fn append_utilization(&self, sample: &UtilizationSample) -> Result<(), SinkError> {
        self.push(SinkRecord::Utilization(*sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_append_keeps_order() {
        let sink = MemorySink::new();
        let now = Utc::now();
        sink.append_event(&EventLogEntry {
            timestamp: now,
            message: "first".to_string(),
        })
        .await
        .unwrap();
        sink.append_utilization(&UtilizationSample {
            timestamp: now,
            utilization: 0.5,
        })
        .await
        .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(matches!(&records[0], SinkRecord::Event(e) if e.message == "first"));
    }

    #[tokio::test]
    async fn test_full_sink_discards_oldest() {
        let sink = MemorySink::with_capacity(3);
        for i in 0..10 {
            sink.append_event(&EventLogEntry {
                timestamp: Utc::now(),
                message: format!("event {}", i),
            })
            .await
            .unwrap();
        }

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(sink.dropped(), 7);
        assert!(matches!(&records[0], SinkRecord::Event(e) if e.message == "event 7"));
        assert!(matches!(&records[2], SinkRecord::Event(e) if e.message == "event 9"));
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(MemorySink::new().capacity(), DEFAULT_MEMORY_CAPACITY);
        assert_eq!(MemorySink::with_capacity(0).capacity(), 1);
    }

    #[tokio::test]
    async fn test_failing_sink_rejects_writes() {
        let sink = MemorySink::new();
        sink.set_failing(true);
        let result = sink
            .append_utilization(&UtilizationSample {
                timestamp: Utc::now(),
                utilization: 0.1,
            })
            .await;
        assert!(matches!(result, Err(SinkError::Unavailable(_))));
        assert!(sink.records().is_empty());
    }
}
