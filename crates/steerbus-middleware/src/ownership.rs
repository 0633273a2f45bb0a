//! Ownership arbitration between writers of one channel.
//!
//! The owner is the live writer with the highest strength. Equal strengths
//! go to the writer with the lowest [`WriterId`], i.e. the one created first.
//! The rule depends only on the set of live writers and their strengths, never
//! on arrival order, so two equal-strength writers cannot steal ownership from
//! each other.
//!
//! [`OwnershipArbiter`] is used in two places:
//!
//! * inside a [`DataReader`][crate::DataReader] on an
//!   [`OwnershipKind::Exclusive`] channel, where samples from non-owners are
//!   dropped before the caller sees them;
//! * by a consumer of an [`OwnershipKind::Shared`] channel, which receives
//!   raw samples from every writer and decides what to render itself.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use steerbus_types::{Sample, SampleKind, SteeringCommand, WriterId};

/// Where arbitration is applied for a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnershipKind {
    /// Readers see every writer's samples; the consumer arbitrates.
    Shared,
    /// Readers only see samples from the current owner.
    #[default]
    Exclusive,
}

#[derive(Debug, Clone)]
struct WriterState {
    strength: i32,
    last: Option<SteeringCommand>,
}

/// Tracks competing writers and names the current owner.
#[derive(Debug, Default)]
pub struct OwnershipArbiter {
    writers: BTreeMap<WriterId, WriterState>,
}

impl OwnershipArbiter {
    /// Arbiter with no writers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `writer` is live with `strength`, optionally with a new
    /// value. A `None` value keeps the previous one.
    pub fn record(&mut self, writer: WriterId, strength: i32, value: Option<SteeringCommand>) {
        let entry = self.writers.entry(writer).or_insert(WriterState {
            strength,
            last: None,
        });
        entry.strength = strength;
        if value.is_some() {
            entry.last = value;
        }
    }

    /// Drop `writer` from arbitration (disposed or no longer alive).
    pub fn remove(&mut self, writer: WriterId) -> bool {
        self.writers.remove(&writer).is_some()
    }

    /// Feed one drained sample.
    ///
    /// Returns `true` when the sample carries data from the writer that owns
    /// the channel once this sample has been taken into account.
    pub fn observe(&mut self, sample: &Sample) -> bool {
        let writer = sample.info.writer;
        match sample.info.kind {
            SampleKind::Data if sample.info.valid => {
                self.record(writer, sample.info.strength, Some(sample.data));
                self.owner() == Some(writer)
            }
            SampleKind::Data => false,
            SampleKind::WriterDisposed | SampleKind::WriterNotAlive => {
                self.remove(writer);
                false
            }
            SampleKind::WriterAlive => {
                self.record(writer, sample.info.strength, None);
                false
            }
        }
    }

    /// The live writer with the highest strength, lowest id on ties.
    pub fn owner(&self) -> Option<WriterId> {
        self.writers
            .iter()
            .max_by_key(|(id, state)| (state.strength, Reverse(**id)))
            .map(|(id, _)| *id)
    }

    /// The most recent value from the owner, if it has published one.
    pub fn current(&self) -> Option<SteeringCommand> {
        self.owner()
            .and_then(|id| self.writers.get(&id))
            .and_then(|state| state.last)
    }

    /// Last strength recorded for `writer`.
    pub fn strength_of(&self, writer: WriterId) -> Option<i32> {
        self.writers.get(&writer).map(|state| state.strength)
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}
