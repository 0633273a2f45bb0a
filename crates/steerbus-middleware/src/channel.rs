//! A single topic lane.
//!
//! Uses [`tokio::sync::broadcast`] under the hood so that every reader owns an
//! independent queue and no reader can block a writer. A reader that falls
//! more than `queue_capacity` samples behind loses the oldest ones.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use steerbus_types::{TypeSchema, WriterId};
use tokio::sync::broadcast;
use tracing::trace;

use crate::liveliness::LivelinessKind;
use crate::ownership::OwnershipKind;
use crate::profile::ChannelProfile;

/// What a [`WireSample`] announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WireKind {
    /// Encoded steering command.
    Data,
    /// Lease renewal or writer announcement, no payload.
    Liveliness,
    /// The writer was deleted.
    Disposed,
}

/// A sample as it travels on the bus, before decoding.
#[derive(Debug, Clone)]
pub(crate) struct WireSample {
    pub writer: WriterId,
    pub strength: i32,
    pub sequence: u64,
    pub source_timestamp: DateTime<Utc>,
    pub kind: WireKind,
    pub payload: Arc<[u8]>,
}

/// A named, typed channel shared by every participant of a domain.
#[derive(Debug)]
pub struct Channel {
    name: String,
    schema: TypeSchema,
    ownership: OwnershipKind,
    liveliness: LivelinessKind,
    lease: Duration,
    sender: broadcast::Sender<WireSample>,
}

impl Channel {
    pub(crate) fn new(profile: &ChannelProfile, schema: TypeSchema) -> Self {
        // broadcast::channel panics on zero capacity.
        let (sender, _) = broadcast::channel(profile.queue_capacity.max(1));
        Self {
            name: profile.name.clone(),
            schema,
            ownership: profile.ownership,
            liveliness: profile.liveliness,
            lease: profile.lease(),
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape of the samples carried.
    pub fn schema(&self) -> &TypeSchema {
        &self.schema
    }

    /// Where ownership is arbitrated for this channel.
    pub fn ownership(&self) -> OwnershipKind {
        self.ownership
    }

    /// Who renews writer leases on this channel.
    pub fn liveliness(&self) -> LivelinessKind {
        self.liveliness
    }

    /// Writer liveliness lease.
    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Number of readers currently attached.
    pub fn reader_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Hand `sample` to every attached reader.
    ///
    /// Returns the number of readers reached. With no reader attached the
    /// sample is dropped and `0` is returned; that is normal best-effort
    /// behaviour, not an error.
    pub(crate) fn send(&self, sample: WireSample) -> usize {
        match self.sender.send(sample) {
            Ok(n) => n,
            Err(broadcast::error::SendError(dropped)) => {
                trace!(
                    channel = %self.name,
                    writer = %dropped.writer,
                    sequence = dropped.sequence,
                    "no readers attached, sample dropped"
                );
                0
            }
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<WireSample> {
        self.sender.subscribe()
    }
}
