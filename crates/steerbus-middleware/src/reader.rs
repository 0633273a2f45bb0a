//! [`DataReader`] – consuming reads from a channel.
//!
//! [`DataReader::take`] drains everything queued since the previous take.
//! Entries from one writer keep their publication order; entries from
//! different writers are interleaved in arrival order.
//!
//! On an [`OwnershipKind::Exclusive`] channel the reader arbitrates before
//! the caller sees anything: data from a writer that does not own the channel
//! is consumed silently. Metadata entries (`valid == false`) are always
//! yielded so the caller learns when a writer disappears. On a shared channel
//! the reader also yields a `WriterAlive` entry whenever a writer appears or
//! changes strength, so the consumer can arbitrate with current strengths.

use std::collections::VecDeque;

use chrono::Utc;
use steerbus_types::{Sample, SampleInfo, SampleKind, SteeringCommand, WriterId};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::channel::{Channel, WireKind, WireSample};
use crate::codec;
use crate::liveliness::LivelinessTracker;
use crate::ownership::{OwnershipArbiter, OwnershipKind};

/// Consuming endpoint on one channel, with its own queue.
///
/// Created through a [`Participant`][crate::Participant]. Only samples
/// published after creation are delivered.
pub struct DataReader {
    name: String,
    channel: String,
    ownership: OwnershipKind,
    receiver: broadcast::Receiver<WireSample>,
    liveliness: LivelinessTracker,
    arbiter: OwnershipArbiter,
}

impl DataReader {
    pub(crate) fn new(name: String, channel: &Channel) -> Self {
        debug!(endpoint = %name, channel = channel.name(), "reader created");
        Self {
            name,
            channel: channel.name().to_string(),
            ownership: channel.ownership(),
            receiver: channel.subscribe(),
            liveliness: LivelinessTracker::new(channel.lease()),
            arbiter: OwnershipArbiter::new(),
        }
    }

    /// Endpoint name from the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the channel this endpoint is attached to.
    pub fn channel_name(&self) -> &str {
        &self.channel
    }

    /// Ownership mode of the channel this reader is attached to.
    pub fn ownership(&self) -> OwnershipKind {
        self.ownership
    }

    /// The writer this reader currently considers the owner, among the live
    /// writers it has heard from.
    pub fn current_owner(&self) -> Option<WriterId> {
        self.arbiter.owner()
    }

    /// Drain the queue.
    ///
    /// The returned iterator is lazy and bounded by what was queued when
    /// `take` was called, so a busy writer cannot keep it going forever. It
    /// first yields one `WriterNotAlive` entry per writer whose lease ran out
    /// since the previous take. Dropping it early still consumes the rest of
    /// the snapshot.
    pub fn take(&mut self) -> Drain<'_> {
        let mut notices = VecDeque::new();
        for writer in self.liveliness.expire() {
            let strength = self.arbiter.strength_of(writer).unwrap_or_default();
            self.arbiter.remove(writer);
            debug!(reader = %self.name, %writer, "writer lease expired");
            notices.push_back(metadata(writer, strength, 0, SampleKind::WriterNotAlive));
        }
        let remaining = self.receiver.len();
        Drain {
            reader: self,
            notices,
            remaining,
        }
    }

    /// Like [`take`][Self::take] but only yields data entries.
    pub fn take_valid(&mut self) -> impl Iterator<Item = Sample> + '_ {
        self.take().filter(|sample| sample.info.valid)
    }

    /// Turn one wire sample into what the caller should see, if anything.
    fn admit(&mut self, wire: WireSample) -> Option<Sample> {
        match wire.kind {
            WireKind::Liveliness => {
                self.liveliness.assert_alive(wire.writer);
                let changed = self.arbiter.strength_of(wire.writer) != Some(wire.strength);
                self.arbiter.record(wire.writer, wire.strength, None);
                // A shared consumer arbitrates itself and needs the new strength.
                (changed && self.ownership == OwnershipKind::Shared).then(|| {
                    metadata(wire.writer, wire.strength, wire.sequence, SampleKind::WriterAlive)
                })
            }
            WireKind::Disposed => {
                self.liveliness.forget(wire.writer);
                self.arbiter.remove(wire.writer);
                Some(metadata(
                    wire.writer,
                    wire.strength,
                    wire.sequence,
                    SampleKind::WriterDisposed,
                ))
            }
            WireKind::Data => {
                let data = match codec::decode(&wire.payload) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(reader = %self.name, writer = %wire.writer, error = %e, "undecodable sample dropped");
                        return None;
                    }
                };
                self.liveliness.assert_alive(wire.writer);
                self.arbiter.record(wire.writer, wire.strength, Some(data));
                if self.ownership == OwnershipKind::Exclusive
                    && self.arbiter.owner() != Some(wire.writer)
                {
                    return None;
                }
                Some(Sample {
                    data,
                    info: SampleInfo {
                        writer: wire.writer,
                        strength: wire.strength,
                        sequence: wire.sequence,
                        source_timestamp: wire.source_timestamp,
                        valid: true,
                        kind: SampleKind::Data,
                    },
                })
            }
        }
    }
}

impl std::fmt::Debug for DataReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataReader")
            .field("name", &self.name)
            .field("channel", &self.channel)
            .field("ownership", &self.ownership)
            .field("pending", &self.receiver.len())
            .finish()
    }
}

fn metadata(writer: WriterId, strength: i32, sequence: u64, kind: SampleKind) -> Sample {
    Sample {
        data: SteeringCommand::default(),
        info: SampleInfo {
            writer,
            strength,
            sequence,
            source_timestamp: Utc::now(),
            valid: false,
            kind,
        },
    }
}

/// Iterator returned by [`DataReader::take`].
pub struct Drain<'a> {
    reader: &'a mut DataReader,
    notices: VecDeque<Sample>,
    remaining: usize,
}

impl Iterator for Drain<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if let Some(notice) = self.notices.pop_front() {
            return Some(notice);
        }
        while self.remaining > 0 {
            match self.reader.receiver.try_recv() {
                Ok(wire) => {
                    self.remaining -= 1;
                    if let Some(sample) = self.reader.admit(wire) {
                        return Some(sample);
                    }
                }
                Err(TryRecvError::Lagged(lost)) => {
                    warn!(reader = %self.reader.name, lagged_by = lost, "reader lagged, oldest samples lost");
                    self.remaining = self.remaining.min(self.reader.receiver.len());
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {
                    self.remaining = 0;
                }
            }
        }
        None
    }
}

impl Drop for Drain<'_> {
    fn drop(&mut self) {
        self.notices.clear();
        while self.next().is_some() {}
    }
}
