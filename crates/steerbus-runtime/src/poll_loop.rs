//! [`PollLoop`] – periodic drain of a reader into a consumer callback.
//!
//! The loop has two states. It sits in [`PollState::Idle`] until the next
//! tick, switches to [`PollState::Draining`] while it takes everything queued
//! on the reader, and returns to `Idle` once the drain is done, whether or
//! not anything was found.
//!
//! Each valid sample reaches [`SampleSink::on_sample`] exactly once, in drain
//! order. Metadata entries (writer disposed, lease expired, strength
//! announced) go to [`SampleSink::on_metadata`] and never reach `on_sample`.
//!
//! On a shared-ownership channel the loop arbitrates on the consumer side: it
//! keeps its own [`OwnershipArbiter`] and only forwards data from the
//! arbitrated owner.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn run(reader: steerbus_middleware::DataReader) {
//! use std::time::Duration;
//! use steerbus_runtime::{PollLoop, SteeringDisplay};
//!
//! let display = SteeringDisplay::new(|rotation: f32| println!("rotate by {rotation}"));
//! let handle = PollLoop::new(reader, display).spawn(Duration::from_millis(100));
//! // ...
//! let _stopped = handle.shutdown().await;
//! # }
//! ```

use std::time::Duration;

use steerbus_middleware::{DataReader, OwnershipArbiter, OwnershipKind};
use steerbus_types::SampleInfo;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace};

/// Consumer callback interface.
pub trait SampleSink: Send {
    /// A valid steering update, delivered once per drained sample.
    fn on_sample(&mut self, position: f32, speed: f32);

    /// A metadata-only entry. The default just logs it.
    fn on_metadata(&mut self, info: &SampleInfo) {
        debug!(writer = %info.writer, kind = ?info.kind, "metadata sample ignored");
    }
}

/// Where the loop is within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Waiting for the next tick.
    Idle,
    /// Taking samples off the reader and calling the sink.
    Draining,
}

/// A reader paired with the sink it feeds.
///
/// Drive it with [`poll_once`][Self::poll_once] from any timer, or hand it
/// to [`spawn`][Self::spawn] for a Tokio interval.
pub struct PollLoop<S> {
    reader: DataReader,
    sink: S,
    state: PollState,
    arbiter: Option<OwnershipArbiter>,
    ticks: u64,
}

impl<S: SampleSink> PollLoop<S> {
    /// Start idle. A shared-ownership reader gets a consumer-side arbiter.
    pub fn new(reader: DataReader, sink: S) -> Self {
        let arbiter = (reader.ownership() == OwnershipKind::Shared).then(OwnershipArbiter::new);
        Self {
            reader,
            sink,
            state: PollState::Idle,
            arbiter,
            ticks: 0,
        }
    }

    /// `Draining` only while [`poll_once`][Self::poll_once] runs.
    pub fn state(&self) -> PollState {
        self.state
    }

    /// Completed drains so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The consumer being fed.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn reader(&self) -> &DataReader {
        &self.reader
    }

    /// Take the reader and sink back, e.g. after shutdown.
    pub fn into_parts(self) -> (DataReader, S) {
        (self.reader, self.sink)
    }

    /// Run one tick: drain the reader and forward what it yields.
    ///
    /// Returns the number of samples handed to [`SampleSink::on_sample`].
    pub fn poll_once(&mut self) -> usize {
        self.state = PollState::Draining;
        let mut forwarded = 0;
        for sample in self.reader.take() {
            let owned = match self.arbiter.as_mut() {
                Some(arbiter) => arbiter.observe(&sample),
                None => true,
            };
            if !sample.info.valid {
                self.sink.on_metadata(&sample.info);
            } else if owned {
                self.sink.on_sample(sample.data.position, sample.data.speed);
                forwarded += 1;
            }
        }
        self.state = PollState::Idle;
        self.ticks += 1;
        forwarded
    }
}

impl<S: SampleSink + 'static> PollLoop<S> {
    /// Move the loop onto a Tokio task ticking every `period`.
    ///
    /// A single task runs every drain, so drains never overlap. Ticks missed
    /// while a drain was running are skipped rather than bunched up.
    pub fn spawn(mut self, period: Duration) -> PollHandle<S> {
        let period = period.max(Duration::from_millis(1));
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            info!(
                reader = self.reader.name(),
                period_ms = period.as_millis() as u64,
                "poll loop started"
            );
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    // Also fires when the handle is dropped.
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let forwarded = self.poll_once();
                        trace!(forwarded, tick = self.ticks, "poll tick");
                    }
                }
            }
            info!(reader = self.reader.name(), ticks = self.ticks, "poll loop stopped");
            self
        });
        PollHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Handle to a spawned [`PollLoop`]. Dropping it cancels the loop.
pub struct PollHandle<S> {
    stop: oneshot::Sender<()>,
    task: JoinHandle<PollLoop<S>>,
}

impl<S> PollHandle<S> {
    /// Cancel future ticks and wait for an in-flight drain to finish.
    ///
    /// Returns the loop, so the reader and sink outlive it; no callback runs
    /// after this resolves.
    pub async fn shutdown(self) -> Result<PollLoop<S>, JoinError> {
        // The task may already be gone; the join below reports why.
        let _ = self.stop.send(());
        self.task.await
    }

    /// Whether the task has already ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use steerbus_middleware::profile::{
        CONTROLLER_PARTICIPANT, DEFAULT_CHANNEL, DISPLAY_PARTICIPANT,
    };
    use steerbus_middleware::{BusProfile, Domain, Participant};
    use steerbus_types::SampleKind;

    #[derive(Default)]
    struct Recorder {
        samples: Vec<(f32, f32)>,
        metadata: Vec<SampleKind>,
    }

    impl SampleSink for Recorder {
        fn on_sample(&mut self, position: f32, speed: f32) {
            self.samples.push((position, speed));
        }
        fn on_metadata(&mut self, info: &SampleInfo) {
            self.metadata.push(info.kind);
        }
    }

    /// Sink whose contents stay visible while the loop owns it.
    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<f32>>>);

    impl SampleSink for Shared {
        fn on_sample(&mut self, position: f32, _speed: f32) {
            self.0.lock().expect("sink lock").push(position);
        }
    }

    impl Shared {
        fn positions(&self) -> Vec<f32> {
            self.0.lock().expect("sink lock").clone()
        }
    }

    fn setup(ownership: OwnershipKind) -> (Participant, Participant) {
        let mut profile = BusProfile::default();
        profile.channels[0].ownership = ownership;
        let domain = Domain::new(profile).expect("profile");
        (
            domain.create_participant(CONTROLLER_PARTICIPANT).unwrap(),
            domain.create_participant(DISPLAY_PARTICIPANT).unwrap(),
        )
    }

    #[test]
    fn empty_tick_returns_to_idle() {
        let (_controller, display) = setup(OwnershipKind::Exclusive);
        let reader = display.resolve_reader(DEFAULT_CHANNEL).unwrap();
        let mut poll = PollLoop::new(reader, Recorder::default());

        assert_eq!(poll.poll_once(), 0);
        assert_eq!(poll.state(), PollState::Idle);
        assert_eq!(poll.ticks(), 1);
        assert!(poll.sink().samples.is_empty());
    }

    #[test]
    fn each_valid_sample_is_forwarded_once_in_order() {
        let (controller, display) = setup(OwnershipKind::Exclusive);
        let reader = display.resolve_reader(DEFAULT_CHANNEL).unwrap();
        let writer = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        let mut poll = PollLoop::new(reader, Recorder::default());

        writer.publish(10.0, 1.0).unwrap();
        writer.publish(20.0, 2.0).unwrap();
        assert_eq!(poll.poll_once(), 2);
        assert_eq!(poll.poll_once(), 0);
        assert_eq!(poll.sink().samples, vec![(10.0, 1.0), (20.0, 2.0)]);
    }

    #[test]
    fn metadata_never_reaches_on_sample() {
        let (controller, display) = setup(OwnershipKind::Exclusive);
        let reader = display.resolve_reader(DEFAULT_CHANNEL).unwrap();
        let writer = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        let mut poll = PollLoop::new(reader, Recorder::default());

        writer.publish(33.0, 0.0).unwrap();
        drop(writer);
        assert_eq!(poll.poll_once(), 1);
        assert_eq!(poll.sink().samples, vec![(33.0, 0.0)]);
        assert_eq!(poll.sink().metadata, vec![SampleKind::WriterDisposed]);
    }

    #[test]
    fn shared_channel_is_arbitrated_by_the_loop() {
        let (controller, display) = setup(OwnershipKind::Shared);
        let reader = display.resolve_reader(DEFAULT_CHANNEL).unwrap();
        let w1 = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        let w2 = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        w1.set_strength(5);
        w2.set_strength(10);
        let mut poll = PollLoop::new(reader, Recorder::default());

        w2.publish(20.0, 0.0).unwrap();
        w1.publish(10.0, 0.0).unwrap();
        w2.publish(21.0, 0.0).unwrap();
        poll.poll_once();
        assert_eq!(poll.sink().samples, vec![(20.0, 0.0), (21.0, 0.0)]);

        drop(w2);
        w1.publish(11.0, 0.0).unwrap();
        poll.poll_once();
        assert_eq!(
            poll.sink().samples,
            vec![(20.0, 0.0), (21.0, 0.0), (11.0, 0.0)]
        );
    }

    #[test]
    fn shared_channel_follows_strength_changes() {
        let (controller, display) = setup(OwnershipKind::Shared);
        let reader = display.resolve_reader(DEFAULT_CHANNEL).unwrap();
        let w1 = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        let w2 = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        let mut poll = PollLoop::new(reader, Recorder::default());
        w1.set_strength(5);
        w2.set_strength(10);

        w2.publish(20.0, 0.0).unwrap();
        w1.publish(10.0, 0.0).unwrap();
        w2.set_strength(1);
        w1.publish(11.0, 0.0).unwrap();
        poll.poll_once();

        assert_eq!(poll.sink().samples, vec![(20.0, 0.0), (11.0, 0.0)]);
        assert!(poll.sink().metadata.iter().all(|k| *k == SampleKind::WriterAlive));
    }

    #[tokio::test]
    async fn published_value_arrives_within_one_cycle() {
        let (controller, display) = setup(OwnershipKind::Exclusive);
        let reader = display.resolve_reader(DEFAULT_CHANNEL).unwrap();
        let writer = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        let sink = Shared::default();
        let handle = PollLoop::new(reader, sink.clone()).spawn(Duration::from_millis(100));

        // Let the immediate first tick pass.
        time::sleep(Duration::from_millis(10)).await;
        writer.publish(45.0, 0.0).unwrap();
        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(sink.positions(), vec![45.0]);

        let stopped = handle.shutdown().await.expect("loop task");
        assert!(stopped.ticks() >= 2);
        assert_eq!(stopped.state(), PollState::Idle);
    }

    #[tokio::test]
    async fn no_callbacks_after_shutdown() {
        let (controller, display) = setup(OwnershipKind::Exclusive);
        let reader = display.resolve_reader(DEFAULT_CHANNEL).unwrap();
        let writer = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        let sink = Shared::default();
        let handle = PollLoop::new(reader, sink.clone()).spawn(Duration::from_millis(5));

        writer.publish(1.0, 0.0).unwrap();
        time::sleep(Duration::from_millis(30)).await;
        let stopped = handle.shutdown().await.expect("loop task");

        writer.publish(2.0, 0.0).unwrap();
        time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sink.positions(), vec![1.0]);

        // The sample is still queued on the returned reader.
        let (mut reader, _) = stopped.into_parts();
        assert_eq!(
            reader.take_valid().map(|s| s.data.position).collect::<Vec<_>>(),
            vec![2.0]
        );
    }

    #[tokio::test]
    async fn dropping_the_handle_cancels_the_loop() {
        let (controller, display) = setup(OwnershipKind::Exclusive);
        let reader = display.resolve_reader(DEFAULT_CHANNEL).unwrap();
        let writer = controller.resolve_writer(DEFAULT_CHANNEL).unwrap();
        let sink = Shared::default();
        drop(PollLoop::new(reader, sink.clone()).spawn(Duration::from_millis(5)));

        time::sleep(Duration::from_millis(20)).await;
        // The reader went away with the task.
        assert_eq!(writer.publish(1.0, 0.0), Ok(0));
        assert!(sink.positions().is_empty());
    }
}
