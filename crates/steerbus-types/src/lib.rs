//! `steerbus-types` – shared vocabulary of the steering bus.
//!
//! Everything that crosses a crate boundary lives here: the statically
//! declared [`SteeringCommand`] record, its runtime [`TypeSchema`], the
//! per-sample delivery metadata ([`SampleInfo`]) and the [`BusError`]
//! taxonomy.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Registered name of the steering command type.
pub const STEERING_COMMAND_TYPE: &str = "SteeringCommand";

/// The steering command published by a controller.
///
/// `position` is in degrees and conceptually spans `[-180, 180]`; the range is
/// not enforced here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SteeringCommand {
    pub position: f32,
    pub speed: f32,
}

impl SteeringCommand {
    pub fn new(position: f32, speed: f32) -> Self {
        Self { position, speed }
    }

    /// Runtime description of this record, used to check that every
    /// participant on a channel agrees on the shape.
    pub fn schema() -> TypeSchema {
        TypeSchema::new(
            STEERING_COMMAND_TYPE,
            vec![
                FieldDecl::new("position", FieldKind::Float32),
                FieldDecl::new("speed", FieldKind::Float32),
            ],
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Schema
// ─────────────────────────────────────────────────────────────────────────────

/// Primitive kinds a declared field may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Float32,
    Float64,
    Int32,
    Int64,
    Bool,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldKind::Float32 => "float32",
            FieldKind::Float64 => "float64",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::Bool => "bool",
        };
        f.write_str(s)
    }
}

/// One `(name, kind)` entry of a [`TypeSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered field list registered under a type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSchema {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

impl TypeSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDecl>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// `true` when both schemas list the same fields in the same order.
    /// The type name is not compared.
    pub fn same_shape(&self, other: &TypeSchema) -> bool {
        self.fields == other.fields
    }
}

impl fmt::Display for TypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.name)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {}: {}", field.name, field.kind)?;
        }
        f.write_str(" }")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Samples
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of a writer endpoint, unique within a domain.
///
/// Ids are handed out in creation order, so ordering them ranks writers by
/// age. Ownership ties are broken in favour of the lowest id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WriterId(pub u64);

impl fmt::Display for WriterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "writer-{}", self.0)
    }
}

/// What a drained entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleKind {
    /// A real position/speed update.
    Data,
    /// The writer was deleted by its participant.
    WriterDisposed,
    /// The writer let its liveliness lease expire.
    WriterNotAlive,
    /// The writer appeared or changed its ownership strength. Only yielded
    /// on shared channels, where the consumer arbitrates.
    WriterAlive,
}

/// Delivery metadata attached to every drained entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInfo {
    pub writer: WriterId,
    /// Writer strength at the moment the sample was published.
    pub strength: i32,
    /// Per-writer publication counter, starting at 1.
    pub sequence: u64,
    pub source_timestamp: DateTime<Utc>,
    /// `false` for metadata-only entries; the data must then be ignored.
    pub valid: bool,
    pub kind: SampleKind,
}

/// One drained entry: the record plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub data: SteeringCommand,
    pub info: SampleInfo,
}

impl Sample {
    /// The steering data, or `None` for a metadata-only entry.
    pub fn value(&self) -> Option<&SteeringCommand> {
        self.info.valid.then_some(&self.data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by the bus.
///
/// Everything except [`BusError::Codec`] is a configuration error: it is
/// detected at startup and must stop the process from serving traffic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BusError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Type mismatch for {name}: registered as `{registered}`, declared as `{declared}`")]
    TypeMismatch {
        name: String,
        registered: String,
        declared: String,
    },

    #[error("Channel declared twice: {0}")]
    DuplicateChannel(String),

    #[error("Profile error: {0}")]
    Config(String),

    #[error("Codec error: {0}")]
    Codec(String),
}

impl BusError {
    /// `true` for errors that must abort startup.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, BusError::Codec(_))
    }
}
