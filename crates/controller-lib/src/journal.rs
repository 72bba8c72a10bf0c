//! Event log and utilization history
//!
//! The journal lives inside the cluster registry, so entries are appended
//! in the order operations complete under the registry lock. Every entry
//! is also forwarded to the durable sink writer through a channel; the
//! in-memory views stay bounded.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::history::BoundedHistory;
use crate::models::{EventLogEntry, UtilizationSample};
use crate::sink::{SinkRecord, SinkSender};

#[derive(Debug)]
pub struct Journal {
    events: BoundedHistory<EventLogEntry>,
    samples: BoundedHistory<UtilizationSample>,
    sink: Option<SinkSender>,
}

impl Journal {
    pub fn new(limit: usize) -> Self {
        Self {
            events: BoundedHistory::new(limit),
            samples: BoundedHistory::new(limit),
            sink: None,
        }
    }

    /// Mirror every future entry to a durable sink
    pub fn attach_sink(&mut self, sink: SinkSender) {
        self.sink = Some(sink);
    }

    pub fn record_event(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        let entry = EventLogEntry {
            timestamp,
            message: message.into(),
        };
        debug!(message = %entry.message, "Cluster event");
        self.forward(SinkRecord::Event(entry.clone()));
        self.events.push(entry);
    }

    pub fn record_sample(&mut self, timestamp: DateTime<Utc>, utilization: f64) -> UtilizationSample {
        let sample = UtilizationSample {
            timestamp,
            utilization,
        };
        self.forward(SinkRecord::Utilization(sample));
        self.samples.push(sample);
        sample
    }

    pub fn events(&self) -> Vec<EventLogEntry> {
        self.events.to_vec()
    }

    pub fn samples(&self) -> Vec<UtilizationSample> {
        self.samples.to_vec()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn forward(&mut self, record: SinkRecord) {
        if let Some(sink) = &self.sink {
            if sink.send(record).is_err() {
                debug!("Sink writer stopped, journal continues in memory only");
                self.sink = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink;

    #[test]
    fn test_journal_bounds_both_views() {
        let mut journal = Journal::new(50);
        let now = Utc::now();
        for i in 0..120 {
            journal.record_event(now, format!("event {}", i));
            journal.record_sample(now, 0.5);
        }
        assert_eq!(journal.events().len(), 50);
        assert_eq!(journal.samples().len(), 50);
        assert_eq!(journal.events()[0].message, "event 70");
    }

    #[test]
    fn test_journal_forwards_every_entry() {
        let (tx, mut rx) = sink::channel();
        let mut journal = Journal::new(2);
        journal.attach_sink(tx);

        let now = Utc::now();
        for i in 0..5 {
            journal.record_event(now, format!("event {}", i));
        }
        journal.record_sample(now, 0.25);

        let mut forwarded = Vec::new();
        while let Ok(record) = rx.try_recv() {
            forwarded.push(record);
        }
        assert_eq!(forwarded.len(), 6);
        assert!(matches!(forwarded[5], SinkRecord::Utilization(s) if s.utilization == 0.25));
    }

    #[test]
    fn test_journal_survives_closed_sink() {
        let (tx, rx) = sink::channel();
        drop(rx);
        let mut journal = Journal::new(10);
        journal.attach_sink(tx);
        journal.record_event(Utc::now(), "still recorded");
        assert_eq!(journal.event_count(), 1);
    }
}
