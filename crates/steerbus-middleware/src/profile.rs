//! Bus profile – reads `~/.steerbus/profile.toml`.
//!
//! The profile names the declared types, the channels and which participant
//! owns which endpoints. When no file exists the built-in default is used: one
//! exclusive `Steering` channel carrying `SteeringCommand`, a
//! `SteeringController` participant with writer `outputs::Steering_writer`
//! and a `SteeringDisplay` participant with reader `inputs::Steering_reader`.
//!
//! ```toml
//! poll_period_ms = 100
//!
//! [[types]]
//! name = "SteeringCommand"
//! fields = [
//!     { name = "position", kind = "float32" },
//!     { name = "speed", kind = "float32" },
//! ]
//!
//! [[channels]]
//! name = "Steering"
//! type_name = "SteeringCommand"
//! ownership = "exclusive"
//! liveliness = "automatic"
//! lease_ms = 2000
//!
//! [participants.SteeringController]
//! writers = [{ name = "outputs::Steering_writer", channel = "Steering", strength = 0 }]
//!
//! [participants.SteeringDisplay]
//! readers = [{ name = "inputs::Steering_reader", channel = "Steering" }]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use steerbus_types::{BusError, STEERING_COMMAND_TYPE, SteeringCommand, TypeSchema};

use crate::liveliness::LivelinessKind;
use crate::ownership::OwnershipKind;

pub const DEFAULT_CHANNEL: &str = "Steering";
pub const CONTROLLER_PARTICIPANT: &str = "SteeringController";
pub const DISPLAY_PARTICIPANT: &str = "SteeringDisplay";
pub const CONTROLLER_WRITER: &str = "outputs::Steering_writer";
pub const DISPLAY_READER: &str = "inputs::Steering_reader";

/// Whole-bus configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusProfile {
    /// Poll Loop period in milliseconds.
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,

    #[serde(default = "default_types")]
    pub types: Vec<TypeSchema>,

    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelProfile>,

    #[serde(default = "default_participants")]
    pub participants: BTreeMap<String, ParticipantProfile>,
}

/// One named, typed channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelProfile {
    pub name: String,
    pub type_name: String,

    #[serde(default)]
    pub ownership: OwnershipKind,

    /// Who keeps writer leases alive: the bus (`automatic`) or the
    /// application (`manual_by_topic`).
    #[serde(default)]
    pub liveliness: LivelinessKind,

    /// Writer liveliness lease in milliseconds.
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,

    /// Samples buffered per reader before the oldest are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl ChannelProfile {
    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }
}

/// Endpoints owned by one participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantProfile {
    #[serde(default)]
    pub writers: Vec<WriterProfile>,
    #[serde(default)]
    pub readers: Vec<ReaderProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterProfile {
    pub name: String,
    pub channel: String,
    /// Initial ownership strength.
    #[serde(default)]
    pub strength: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderProfile {
    pub name: String,
    pub channel: String,
}

fn default_poll_period_ms() -> u64 {
    100
}
fn default_lease_ms() -> u64 {
    2_000
}
fn default_queue_capacity() -> usize {
    256
}
fn default_types() -> Vec<TypeSchema> {
    vec![SteeringCommand::schema()]
}
fn default_channels() -> Vec<ChannelProfile> {
    vec![ChannelProfile {
        name: DEFAULT_CHANNEL.to_string(),
        type_name: STEERING_COMMAND_TYPE.to_string(),
        ownership: OwnershipKind::Exclusive,
        liveliness: LivelinessKind::Automatic,
        lease_ms: default_lease_ms(),
        queue_capacity: default_queue_capacity(),
    }]
}
fn default_participants() -> BTreeMap<String, ParticipantProfile> {
    let mut participants = BTreeMap::new();
    participants.insert(
        CONTROLLER_PARTICIPANT.to_string(),
        ParticipantProfile {
            writers: vec![WriterProfile {
                name: CONTROLLER_WRITER.to_string(),
                channel: DEFAULT_CHANNEL.to_string(),
                strength: 0,
            }],
            readers: Vec::new(),
        },
    );
    participants.insert(
        DISPLAY_PARTICIPANT.to_string(),
        ParticipantProfile {
            writers: Vec::new(),
            readers: vec![ReaderProfile {
                name: DISPLAY_READER.to_string(),
                channel: DEFAULT_CHANNEL.to_string(),
            }],
        },
    );
    participants
}

impl Default for BusProfile {
    fn default() -> Self {
        Self {
            poll_period_ms: default_poll_period_ms(),
            types: default_types(),
            channels: default_channels(),
            participants: default_participants(),
        }
    }
}

impl BusProfile {
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelProfile> {
        self.channels.iter().find(|c| c.name == name)
    }
}

/// Path of the active profile: `STEERBUS_PROFILE` if set, otherwise
/// `~/.steerbus/profile.toml`.
pub fn profile_path() -> PathBuf {
    if let Ok(p) = std::env::var("STEERBUS_PROFILE") {
        return PathBuf::from(p);
    }
    profile_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn profile_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".steerbus").join("profile.toml")
}

/// Load the active profile, falling back to [`BusProfile::default`] when the
/// file does not exist. Environment overrides are applied in both cases.
pub fn load() -> Result<BusProfile, BusError> {
    let mut profile = load_from(&profile_path())?.unwrap_or_default();
    apply_env_overrides(&mut profile);
    Ok(profile)
}

/// Parse the profile at `path`. Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<BusProfile>, BusError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        BusError::Config(format!("failed to read profile at {}: {e}", path.display()))
    })?;
    let profile = toml::from_str(&raw).map_err(|e| {
        BusError::Config(format!("failed to parse profile at {}: {e}", path.display()))
    })?;
    Ok(Some(profile))
}

/// Apply `STEERBUS_*` environment overrides.
///
/// | Variable | Effect |
/// |---|---|
/// | `STEERBUS_POLL_MS` | `poll_period_ms` |
/// | `STEERBUS_LEASE_MS` | `lease_ms` of every channel |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(profile: &mut BusProfile) {
    if let Ok(v) = std::env::var("STEERBUS_POLL_MS")
        && let Ok(ms) = v.parse::<u64>()
        && ms > 0
    {
        profile.poll_period_ms = ms;
    }
    if let Ok(v) = std::env::var("STEERBUS_LEASE_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        for channel in &mut profile.channels {
            channel.lease_ms = ms;
        }
    }
}
