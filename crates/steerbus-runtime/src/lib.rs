//! `steerbus-runtime` – drives the bus from an application.
//!
//! # Modules
//!
//! - [`poll_loop`] – [`PollLoop`][poll_loop::PollLoop]: the periodic,
//!   cancellable task that drains a [`DataReader`][steerbus_middleware::DataReader]
//!   and forwards every valid sample to a [`SampleSink`][poll_loop::SampleSink].
//! - [`controller`] – [`SteeringController`][controller::SteeringController]:
//!   turns slider movements into published steering commands.
//! - [`display`] – [`SteeringDisplay`][display::SteeringDisplay]: a sink that
//!   keeps the last rendered angle and hands the wheel rotation to a
//!   [`Render`][display::Render] backend.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod controller;
pub mod display;
pub mod poll_loop;
pub mod telemetry;

pub use controller::SteeringController;
pub use display::{Render, SteeringDisplay};
pub use poll_loop::{PollHandle, PollLoop, PollState, SampleSink};
pub use telemetry::{TracerProviderGuard, init_tracing};
