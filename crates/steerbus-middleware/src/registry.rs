//! Type registry, bus domain and participants.
//!
//! A [`Domain`] is the explicit bus context: it is built once at startup from
//! a [`BusProfile`], validated in full, and then shared by reference with every
//! [`Participant`] that attaches to it. There is no ambient global state.
//!
//! Validation failures are configuration errors. They are returned from
//! [`Domain::new`] and mean no endpoint can ever connect through a channel
//! whose declared shape differs from [`SteeringCommand`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use steerbus_types::{BusError, STEERING_COMMAND_TYPE, SteeringCommand, TypeSchema, WriterId};
use tracing::{debug, info};

use crate::channel::Channel;
use crate::profile::{BusProfile, ParticipantProfile};
use crate::reader::DataReader;
use crate::writer::DataWriter;

// ─────────────────────────────────────────────────────────────────────────────
// TypeRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Named schemas known to a domain.
///
/// [`SteeringCommand`] is always registered. Every other declaration must
/// either be new or repeat an existing one with the identical shape.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeSchema>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut types = HashMap::new();
        types.insert(STEERING_COMMAND_TYPE.to_string(), SteeringCommand::schema());
        Self { types }
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `schema` under its name.
    ///
    /// Re-declaring a name with the same shape is a no-op. A different shape
    /// is a [`BusError::TypeMismatch`].
    pub fn declare_type(&mut self, schema: TypeSchema) -> Result<(), BusError> {
        match self.types.get(&schema.name) {
            Some(existing) if existing.same_shape(&schema) => Ok(()),
            Some(existing) => Err(BusError::TypeMismatch {
                name: schema.name.clone(),
                registered: existing.to_string(),
                declared: schema.to_string(),
            }),
            None => {
                debug!(type_name = %schema.name, "type declared");
                self.types.insert(schema.name.clone(), schema);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeSchema> {
        self.types.get(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct DomainInner {
    types: TypeRegistry,
    channels: HashMap<String, Arc<Channel>>,
    participants: HashMap<String, ParticipantProfile>,
    next_writer: AtomicU64,
}

/// The shared bus. Clone it cheaply – all clones share the same channels.
#[derive(Debug, Clone)]
pub struct Domain {
    inner: Arc<DomainInner>,
}

impl Domain {
    /// Build and validate a domain from `profile`.
    ///
    /// # Errors
    ///
    /// * [`BusError::TypeMismatch`] – a declared type conflicts with an
    ///   earlier declaration, or a channel's type does not have the
    ///   [`SteeringCommand`] shape.
    /// * [`BusError::UnknownType`] – a channel names an undeclared type.
    /// * [`BusError::DuplicateChannel`] – two channels share a name.
    /// * [`BusError::UnknownChannel`] – an endpoint names a missing channel.
    pub fn new(profile: BusProfile) -> Result<Self, BusError> {
        let mut types = TypeRegistry::new();
        for schema in profile.types {
            types.declare_type(schema)?;
        }

        let expected = SteeringCommand::schema();
        let mut channels = HashMap::new();
        for channel in &profile.channels {
            let schema = types
                .get(&channel.type_name)
                .ok_or_else(|| BusError::UnknownType(channel.type_name.clone()))?;
            if !schema.same_shape(&expected) {
                return Err(BusError::TypeMismatch {
                    name: channel.name.clone(),
                    registered: expected.to_string(),
                    declared: schema.to_string(),
                });
            }
            let lane = Arc::new(Channel::new(channel, schema.clone()));
            if channels.insert(channel.name.clone(), lane).is_some() {
                return Err(BusError::DuplicateChannel(channel.name.clone()));
            }
        }

        for participant in profile.participants.values() {
            let endpoint_channels = participant
                .writers
                .iter()
                .map(|w| &w.channel)
                .chain(participant.readers.iter().map(|r| &r.channel));
            for channel in endpoint_channels {
                if !channels.contains_key(channel) {
                    return Err(BusError::UnknownChannel(channel.clone()));
                }
            }
        }

        info!(
            channels = channels.len(),
            participants = profile.participants.len(),
            "bus domain ready"
        );

        Ok(Self {
            inner: Arc::new(DomainInner {
                types,
                channels,
                participants: profile.participants.into_iter().collect(),
                next_writer: AtomicU64::new(1),
            }),
        })
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.inner.types
    }

    pub fn channel(&self, name: &str) -> Result<&Arc<Channel>, BusError> {
        self.inner
            .channels
            .get(name)
            .ok_or_else(|| BusError::UnknownChannel(name.to_string()))
    }

    /// Attach a participant declared in the profile.
    pub fn create_participant(&self, name: &str) -> Result<Participant, BusError> {
        let profile = self
            .inner
            .participants
            .get(name)
            .cloned()
            .ok_or_else(|| BusError::UnknownParticipant(name.to_string()))?;
        debug!(participant = name, "participant created");
        Ok(Participant {
            name: name.to_string(),
            domain: self.clone(),
            profile,
        })
    }

    fn next_writer_id(&self) -> WriterId {
        WriterId(self.inner.next_writer.fetch_add(1, Ordering::Relaxed))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Participant
// ─────────────────────────────────────────────────────────────────────────────

/// One process's membership of the bus.
///
/// A participant only creates endpoints; it never shares mutable state with
/// other participants except through the domain's channels.
#[derive(Debug, Clone)]
pub struct Participant {
    name: String,
    domain: Domain,
    profile: ParticipantProfile,
}

impl Participant {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Create a writer on `channel_name`.
    ///
    /// The initial strength is taken from this participant's first profile
    /// writer on that channel, or `0` when the profile declares none.
    pub fn resolve_writer(&self, channel_name: &str) -> Result<DataWriter, BusError> {
        let channel = self.domain.channel(channel_name)?;
        let declared = self.profile.writers.iter().find(|w| w.channel == channel_name);
        let (name, strength) = match declared {
            Some(w) => (w.name.clone(), w.strength),
            None => (format!("{}::{channel_name}_writer", self.name), 0),
        };
        Ok(DataWriter::new(
            self.domain.next_writer_id(),
            name,
            Arc::clone(channel),
            strength,
        ))
    }

    /// Create a reader on `channel_name`.
    pub fn resolve_reader(&self, channel_name: &str) -> Result<DataReader, BusError> {
        let channel = self.domain.channel(channel_name)?;
        let name = self
            .profile
            .readers
            .iter()
            .find(|r| r.channel == channel_name)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| format!("{}::{channel_name}_reader", self.name));
        Ok(DataReader::new(name, channel))
    }

    /// Create the writer declared in the profile as `endpoint_name`.
    pub fn find_writer(&self, endpoint_name: &str) -> Result<DataWriter, BusError> {
        let declared = self
            .profile
            .writers
            .iter()
            .find(|w| w.name == endpoint_name)
            .ok_or_else(|| BusError::UnknownEndpoint(endpoint_name.to_string()))?;
        let channel = self.domain.channel(&declared.channel)?;
        Ok(DataWriter::new(
            self.domain.next_writer_id(),
            declared.name.clone(),
            Arc::clone(channel),
            declared.strength,
        ))
    }

    /// Create the reader declared in the profile as `endpoint_name`.
    pub fn find_reader(&self, endpoint_name: &str) -> Result<DataReader, BusError> {
        let declared = self
            .profile
            .readers
            .iter()
            .find(|r| r.name == endpoint_name)
            .ok_or_else(|| BusError::UnknownEndpoint(endpoint_name.to_string()))?;
        let channel = self.domain.channel(&declared.channel)?;
        Ok(DataReader::new(declared.name.clone(), channel))
    }
}
