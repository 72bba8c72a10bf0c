//! Time source abstraction
//!
//! Every registry operation reads one [`Stamp`]: wall time for journal
//! entries, samples and API output, and a monotonic instant for heartbeat
//! ages and the autoscale cooldown, so stepping the wall clock never fails
//! or shields a node. Tests drive both with [`ManualClock`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::time::Instant;

/// One clock reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub wall: DateTime<Utc>,
    pub instant: Instant,
}

impl Stamp {
    /// Reading of the system clock
    pub fn now() -> Self {
        SystemClock.stamp()
    }
}

pub trait Clock: Send + Sync {
    /// Wall time, for records
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic time, for measuring ages
    fn instant(&self) -> Instant;

    fn stamp(&self) -> Stamp {
        Stamp {
            wall: self.now(),
            instant: self.instant(),
        }
    }
}

/// Wall clock plus the tokio monotonic clock (which follows paused test time)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct ManualReading {
    wall: DateTime<Utc>,
    elapsed: Duration,
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    reading: Mutex<ManualReading>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            reading: Mutex::new(ManualReading {
                wall: start,
                elapsed: Duration::ZERO,
            }),
        }
    }

    /// Let `by` pass on both the wall and the monotonic clock
    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        let mut reading = self.reading.lock();
        reading.wall += delta;
        reading.elapsed += by;
    }

    /// Step the wall clock only, as an operator or NTP would
    pub fn set(&self, at: DateTime<Utc>) {
        self.reading.lock().wall = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.reading.lock().wall
    }

    fn instant(&self) -> Instant {
        self.origin + self.reading.lock().elapsed
    }
}
