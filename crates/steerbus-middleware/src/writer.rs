//! [`DataWriter`] – publishes steering commands onto a channel.
//!
//! Publishing is fire-and-forget: the sample is encoded and handed to every
//! reader attached at that instant. Nothing is retained for readers that
//! attach later, and a channel without readers simply swallows the sample.
//!
//! A writer can be shared behind an [`Arc`] with whatever UI callback drives
//! it. Sequence allocation and the send happen under one lock, so readers see
//! each writer's samples in sequence order even with concurrent publishers.
//!
//! On an automatic-liveliness channel the writer owns a heartbeat thread
//! that renews its lease at half the lease period until the writer is
//! dropped. See [`LivelinessKind`][crate::LivelinessKind].

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use steerbus_types::{BusError, SteeringCommand, WriterId};
use tracing::{debug, trace, warn};

use crate::channel::{Channel, WireKind, WireSample};
use crate::codec;

/// State shared between the writer handle and its heartbeat thread.
struct WriterCore {
    id: WriterId,
    channel: Arc<Channel>,
    strength: AtomicI32,
    /// Sequence number of the last data sample. Held across every send.
    sequence: Mutex<u64>,
}

impl WriterCore {
    fn wire(&self, sequence: u64, kind: WireKind, payload: Arc<[u8]>) -> WireSample {
        WireSample {
            writer: self.id,
            strength: self.strength.load(Ordering::Acquire),
            sequence,
            source_timestamp: Utc::now(),
            kind,
            payload,
        }
    }

    fn send_meta(&self, kind: WireKind) -> usize {
        let sequence = self.sequence.lock();
        self.channel.send(self.wire(*sequence, kind, empty_payload()))
    }
}

fn empty_payload() -> Arc<[u8]> {
    Arc::from(Vec::<u8>::new())
}

/// Background liveliness assertion for one writer.
struct Heartbeat {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl Heartbeat {
    fn spawn(core: Arc<WriterCore>, period: Duration) -> std::io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name(format!("steerbus-{}", core.id))
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {
                            let delivered = core.send_meta(WireKind::Liveliness);
                            trace!(writer = %core.id, delivered, "liveliness asserted");
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;
        Ok(Self { stop, thread })
    }

    /// Stop the thread and wait for it, so no assertion follows.
    fn stop(self) {
        drop(self.stop);
        if self.thread.join().is_err() {
            warn!("liveliness heartbeat thread panicked");
        }
    }
}

/// Publishing endpoint on one channel.
///
/// Created through a [`Participant`][crate::Participant]. Dropping the writer
/// stops its heartbeat and tells every attached reader it was disposed.
pub struct DataWriter {
    name: String,
    core: Arc<WriterCore>,
    heartbeat: Option<Heartbeat>,
}

impl DataWriter {
    /// The writer announces itself, with its initial strength, to readers
    /// already attached.
    pub(crate) fn new(id: WriterId, name: String, channel: Arc<Channel>, strength: i32) -> Self {
        let liveliness = channel.liveliness();
        let lease = channel.lease();
        let core = Arc::new(WriterCore {
            id,
            channel,
            strength: AtomicI32::new(strength),
            sequence: Mutex::new(0),
        });
        let heartbeat = liveliness.heartbeat_period(lease).and_then(|period| {
            match Heartbeat::spawn(Arc::clone(&core), period) {
                Ok(heartbeat) => Some(heartbeat),
                Err(e) => {
                    warn!(writer = %id, error = %e, "liveliness heartbeat unavailable; lease renews on publish only");
                    None
                }
            }
        });
        debug!(
            writer = %id,
            endpoint = %name,
            channel = core.channel.name(),
            strength,
            ?liveliness,
            "writer created"
        );
        core.send_meta(WireKind::Liveliness);
        Self {
            name,
            core,
            heartbeat,
        }
    }

    /// Bus-wide identity; lower ids win ownership ties.
    pub fn id(&self) -> WriterId {
        self.core.id
    }

    /// Endpoint name from the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the channel this endpoint is attached to.
    pub fn channel_name(&self) -> &str {
        self.core.channel.name()
    }

    /// Current ownership strength.
    pub fn strength(&self) -> i32 {
        self.core.strength.load(Ordering::Acquire)
    }

    /// Change the ownership strength.
    ///
    /// A changed value is announced to attached readers straight away, so it
    /// counts for arbitration before this writer publishes again.
    pub fn set_strength(&self, strength: i32) {
        let sequence = self.core.sequence.lock();
        let previous = self.core.strength.swap(strength, Ordering::AcqRel);
        if previous == strength {
            return;
        }
        let delivered = self
            .core
            .channel
            .send(self.core.wire(*sequence, WireKind::Liveliness, empty_payload()));
        debug!(writer = %self.core.id, previous, strength, delivered, "ownership strength changed");
    }

    /// Sequence number of the most recent data sample, `0` before the first.
    pub fn sequence(&self) -> u64 {
        *self.core.sequence.lock()
    }

    /// Publish `command` to every reader currently attached.
    ///
    /// Returns how many readers were handed the sample. `Ok(0)` means nobody
    /// was listening and the sample is gone; that is not an error.
    ///
    /// # Errors
    ///
    /// [`BusError::Codec`] if the command cannot be encoded.
    pub fn write(&self, command: &SteeringCommand) -> Result<usize, BusError> {
        let payload = codec::encode(command)?;
        let mut sequence = self.core.sequence.lock();
        *sequence += 1;
        let delivered = self
            .core
            .channel
            .send(self.core.wire(*sequence, WireKind::Data, Arc::from(payload)));
        trace!(
            writer = %self.core.id,
            sequence = *sequence,
            position = command.position,
            speed = command.speed,
            delivered,
            "sample published"
        );
        Ok(delivered)
    }

    /// Convenience for [`write`][Self::write] with loose fields.
    pub fn publish(&self, position: f32, speed: f32) -> Result<usize, BusError> {
        self.write(&SteeringCommand::new(position, speed))
    }

    /// Renew this writer's liveliness lease without publishing data.
    ///
    /// Needed on `ManualByTopic` channels when the writer has nothing to
    /// publish; automatic channels do this in the background.
    pub fn assert_liveliness(&self) -> usize {
        self.core.send_meta(WireKind::Liveliness)
    }

    /// Whether a background heartbeat keeps this writer alive.
    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat.is_some()
    }
}

impl Drop for DataWriter {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
        let delivered = self.core.send_meta(WireKind::Disposed);
        debug!(writer = %self.core.id, delivered, "writer disposed");
    }
}

impl std::fmt::Debug for DataWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataWriter")
            .field("id", &self.core.id)
            .field("name", &self.name)
            .field("channel", &self.core.channel.name())
            .field("strength", &self.strength())
            .field("sequence", &self.sequence())
            .field("heartbeat", &self.has_heartbeat())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use crate::liveliness::LivelinessKind;
    use crate::profile::{BusProfile, CONTROLLER_PARTICIPANT, DEFAULT_CHANNEL, DISPLAY_PARTICIPANT};
    use crate::registry::Domain;

    fn domain() -> Domain {
        Domain::new(BusProfile::default()).expect("default profile")
    }

    #[test]
    fn publish_without_readers_is_not_an_error() {
        let domain = domain();
        let controller = domain.create_participant(CONTROLLER_PARTICIPANT).unwrap();
        let writer = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        assert_eq!(writer.publish(45.0, 0.0), Ok(0));
        assert_eq!(writer.sequence(), 1);
    }

    #[test]
    fn publish_reaches_every_attached_reader() {
        let domain = domain();
        let controller = domain.create_participant(CONTROLLER_PARTICIPANT).unwrap();
        let writer = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        let _a = controller.resolve_reader(DEFAULT_CHANNEL).unwrap();
        let _b = controller.resolve_reader(DEFAULT_CHANNEL).unwrap();
        assert_eq!(writer.publish(1.0, 0.0), Ok(2));
    }

    #[test]
    fn sequence_counts_data_samples_only() {
        let domain = domain();
        let controller = domain.create_participant(CONTROLLER_PARTICIPANT).unwrap();
        let writer = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        writer.publish(1.0, 0.0).unwrap();
        writer.assert_liveliness();
        writer.publish(2.0, 0.0).unwrap();
        assert_eq!(writer.sequence(), 2);
    }

    #[test]
    fn strength_can_change_at_runtime() {
        let domain = domain();
        let controller = domain.create_participant(CONTROLLER_PARTICIPANT).unwrap();
        let writer = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        assert_eq!(writer.strength(), 0);
        writer.set_strength(12);
        assert_eq!(writer.strength(), 12);
        assert!(format!("{writer:?}").contains("strength: 12"));
    }

    #[test]
    fn heartbeat_follows_the_channel_liveliness() {
        let domain = domain();
        let controller = domain.create_participant(CONTROLLER_PARTICIPANT).unwrap();
        assert!(controller.resolve_writer(DEFAULT_CHANNEL).unwrap().has_heartbeat());

        let mut profile = BusProfile::default();
        profile.channels[0].liveliness = LivelinessKind::ManualByTopic;
        let domain = Domain::new(profile).unwrap();
        let controller = domain.create_participant(CONTROLLER_PARTICIPANT).unwrap();
        assert!(!controller.resolve_writer(DEFAULT_CHANNEL).unwrap().has_heartbeat());
    }

    #[test]
    fn changed_strength_is_announced() {
        let domain = domain();
        let controller = domain.create_participant(CONTROLLER_PARTICIPANT).unwrap();
        let writer = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        let channel = Arc::clone(domain.channel(DEFAULT_CHANNEL).unwrap());
        let mut rx = channel.subscribe();

        writer.set_strength(0);
        assert!(rx.try_recv().is_err(), "unchanged strength sends nothing");

        writer.set_strength(7);
        let announced = rx.try_recv().expect("announcement");
        assert_eq!(announced.strength, 7);
        assert_eq!(announced.writer, writer.id());
        assert_eq!(writer.sequence(), 0);
    }

    #[test]
    fn concurrent_publishers_keep_sequence_order() {
        let mut profile = BusProfile::default();
        profile.channels[0].queue_capacity = 4_096;
        let domain = Domain::new(profile).unwrap();
        let controller = domain.create_participant(CONTROLLER_PARTICIPANT).unwrap();
        let display = domain.create_participant(DISPLAY_PARTICIPANT).unwrap();
        let mut reader = display.resolve_reader(DEFAULT_CHANNEL).unwrap();
        let writer = Arc::new(controller.resolve_writer(DEFAULT_CHANNEL).unwrap());

        let publishers: Vec<_> = (0..4)
            .map(|t| {
                let writer = Arc::clone(&writer);
                thread::spawn(move || {
                    for i in 0..250 {
                        writer.publish((t * 1_000 + i) as f32, 0.0).unwrap();
                    }
                })
            })
            .collect();
        for publisher in publishers {
            publisher.join().unwrap();
        }

        let sequences: Vec<u64> = reader.take_valid().map(|s| s.info.sequence).collect();
        assert_eq!(sequences, (1..=1_000).collect::<Vec<u64>>());
        assert_eq!(writer.sequence(), 1_000);
    }
}
