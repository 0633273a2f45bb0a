//! On-bus encoding of a [`SteeringCommand`].
//!
//! A payload is a 4-byte encapsulation header followed by the `bincode`
//! encoding of the record: two little-endian IEEE-754 `f32`s, position first.
//! Floats are copied bit for bit, so `-0.0`, infinities and NaN payloads
//! survive the trip unchanged.

use steerbus_types::{BusError, SteeringCommand};

/// Little-endian encapsulation marker.
pub const ENCAPSULATION_LE: [u8; 4] = [0x00, 0x01, 0x00, 0x00];

/// Encoded size of one steering command, header included.
pub const ENCODED_LEN: usize = ENCAPSULATION_LE.len() + 8;

pub fn encode(command: &SteeringCommand) -> Result<Vec<u8>, BusError> {
    let body = bincode::serialize(command).map_err(|e| BusError::Codec(e.to_string()))?;
    let mut out = Vec::with_capacity(ENCODED_LEN);
    out.extend_from_slice(&ENCAPSULATION_LE);
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<SteeringCommand, BusError> {
    if bytes.len() != ENCODED_LEN {
        return Err(BusError::Codec(format!(
            "expected {ENCODED_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let (header, body) = bytes.split_at(ENCAPSULATION_LE.len());
    if header != ENCAPSULATION_LE {
        return Err(BusError::Codec(format!(
            "unsupported encapsulation {header:02x?}"
        )));
    }
    bincode::deserialize(body).map_err(|e| BusError::Codec(e.to_string()))
}
