//! [`LivelinessTracker`] – reader-side view of which writers are still alive.
//!
//! Every sample or liveliness assertion received from a writer renews that
//! writer's lease. A writer whose lease has run out is *not alive* and stops
//! counting for ownership. [`LivelinessTracker::expire`] reports each expiry
//! exactly once, so the reader can turn it into a single metadata sample.
//!
//! Who renews the lease is set per channel by [`LivelinessKind`]. With
//! `Automatic` every writer runs a heartbeat at half the lease, so a writer
//! that still exists never expires however long it stays quiet. With
//! `ManualByTopic` only data and [`DataWriter::assert_liveliness`] renew it.
//!
//! [`DataWriter::assert_liveliness`]: crate::DataWriter::assert_liveliness

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use steerbus_types::WriterId;

/// How writers on a channel keep their lease alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivelinessKind {
    /// The writer asserts liveliness in the background for as long as it
    /// exists.
    #[default]
    Automatic,
    /// The application must publish or call `assert_liveliness` within every
    /// lease period.
    ManualByTopic,
}

impl LivelinessKind {
    /// Heartbeat period for `lease`, or `None` when the writer must assert
    /// liveliness itself.
    pub fn heartbeat_period(self, lease: Duration) -> Option<Duration> {
        match self {
            LivelinessKind::Automatic => Some((lease / 2).max(Duration::from_millis(1))),
            LivelinessKind::ManualByTopic => None,
        }
    }
}

/// Liveliness of a single writer as seen by one reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterHealth {
    /// Heard from within the lease.
    Alive,
    /// Lease expired, or the writer was never seen.
    NotAlive,
}

struct LeaseEntry {
    last_asserted: Instant,
    reported: bool,
}

/// Tracks the lease of every writer a reader has heard from.
pub struct LivelinessTracker {
    lease: Duration,
    writers: HashMap<WriterId, LeaseEntry>,
}

impl LivelinessTracker {
    /// Tracker expiring writers silent for longer than `lease`.
    pub fn new(lease: Duration) -> Self {
        Self {
            lease,
            writers: HashMap::new(),
        }
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Renew `writer`'s lease. Unknown writers start tracking here; a writer
    /// that had expired becomes alive again.
    pub fn assert_alive(&mut self, writer: WriterId) {
        self.writers.insert(
            writer,
            LeaseEntry {
                last_asserted: Instant::now(),
                reported: false,
            },
        );
    }

    /// Stop tracking `writer` (it was disposed).
    pub fn forget(&mut self, writer: WriterId) {
        self.writers.remove(&writer);
    }

    /// Current health of `writer`, judged against the lease right now.
    pub fn health(&self, writer: WriterId) -> WriterHealth {
        match self.writers.get(&writer) {
            Some(entry) if entry.last_asserted.elapsed() <= self.lease => WriterHealth::Alive,
            _ => WriterHealth::NotAlive,
        }
    }

    /// Writers whose lease ran out since the previous call, lowest id first.
    ///
    /// A writer is reported once per expiry; it is reported again only after
    /// it has been renewed and expired anew.
    pub fn expire(&mut self) -> Vec<WriterId> {
        let lease = self.lease;
        let mut expired: Vec<WriterId> = self
            .writers
            .iter_mut()
            .filter(|(_, entry)| !entry.reported && entry.last_asserted.elapsed() > lease)
            .map(|(id, entry)| {
                entry.reported = true;
                *id
            })
            .collect();
        expired.sort();
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_writer_is_alive() {
        let mut tracker = LivelinessTracker::new(Duration::from_secs(5));
        tracker.assert_alive(WriterId(1));
        assert_eq!(tracker.health(WriterId(1)), WriterHealth::Alive);
    }

    #[test]
    fn unknown_writer_is_not_alive() {
        let tracker = LivelinessTracker::new(Duration::from_secs(5));
        assert_eq!(tracker.health(WriterId(9)), WriterHealth::NotAlive);
    }

    #[test]
    fn renewal_extends_the_lease() {
        let mut tracker = LivelinessTracker::new(Duration::from_millis(20));
        tracker.assert_alive(WriterId(1));
        thread::sleep(Duration::from_millis(10));
        tracker.assert_alive(WriterId(1));
        thread::sleep(Duration::from_millis(10));
        assert_eq!(tracker.health(WriterId(1)), WriterHealth::Alive);
    }

    #[test]
    fn silent_writer_expires_once() {
        let mut tracker = LivelinessTracker::new(Duration::from_millis(20));
        tracker.assert_alive(WriterId(2));
        tracker.assert_alive(WriterId(1));
        thread::sleep(Duration::from_millis(30));

        assert_eq!(tracker.expire(), vec![WriterId(1), WriterId(2)]);
        assert!(tracker.expire().is_empty());
        assert_eq!(tracker.health(WriterId(1)), WriterHealth::NotAlive);
    }

    #[test]
    fn expired_writer_can_come_back() {
        let mut tracker = LivelinessTracker::new(Duration::from_millis(20));
        tracker.assert_alive(WriterId(1));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(tracker.expire(), vec![WriterId(1)]);

        tracker.assert_alive(WriterId(1));
        assert_eq!(tracker.health(WriterId(1)), WriterHealth::Alive);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(tracker.expire(), vec![WriterId(1)]);
    }

    #[test]
    fn forgotten_writer_is_never_reported() {
        let mut tracker = LivelinessTracker::new(Duration::from_millis(10));
        tracker.assert_alive(WriterId(1));
        tracker.forget(WriterId(1));
        thread::sleep(Duration::from_millis(20));
        assert!(tracker.expire().is_empty());
    }

    #[test]
    fn automatic_heartbeat_runs_at_half_the_lease() {
        let kind = LivelinessKind::default();
        assert_eq!(kind, LivelinessKind::Automatic);
        assert_eq!(
            kind.heartbeat_period(Duration::from_millis(2_000)),
            Some(Duration::from_millis(1_000))
        );
        assert_eq!(
            kind.heartbeat_period(Duration::ZERO),
            Some(Duration::from_millis(1))
        );
        assert_eq!(
            LivelinessKind::ManualByTopic.heartbeat_period(Duration::from_secs(1)),
            None
        );
    }
}
