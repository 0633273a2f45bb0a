//! `steerbus-middleware` – the data-distribution layer.
//!
//! Carries steering commands from writers to readers on named channels and
//! decides whose updates take effect when several writers compete.
//!
//! # Modules
//!
//! - [`registry`] – [`TypeRegistry`], [`Domain`] and [`Participant`]: the
//!   explicit bus context built from a [`BusProfile`], resolving endpoints by
//!   channel or endpoint name.
//! - [`channel`] – one topic lane backed by a Tokio broadcast channel, so every
//!   reader gets an independent queue.
//! - [`writer`] – [`DataWriter`]: fire-and-forget publish with a per-writer
//!   ownership strength.
//! - [`reader`] – [`DataReader`]: consuming `take()` that applies exclusive
//!   ownership and reports writers that disappeared.
//! - [`ownership`] – [`OwnershipArbiter`]: highest-strength-wins arbitration,
//!   usable inside the reader or by a consumer.
//! - [`liveliness`] – [`LivelinessTracker`]: lease-based writer liveness, kept
//!   up by a per-writer heartbeat on [`LivelinessKind::Automatic`] channels.
//! - [`codec`] – the on-bus encoding of a [`SteeringCommand`][steerbus_types::SteeringCommand].
//! - [`profile`] – TOML bus profile with `STEERBUS_*` environment overrides.

pub mod channel;
pub mod codec;
pub mod liveliness;
pub mod ownership;
pub mod profile;
pub mod reader;
pub mod registry;
pub mod writer;

pub use liveliness::{LivelinessKind, LivelinessTracker, WriterHealth};
pub use ownership::{OwnershipArbiter, OwnershipKind};
pub use profile::BusProfile;
pub use reader::{DataReader, Drain};
pub use registry::{Domain, Participant, TypeRegistry};
pub use writer::DataWriter;
