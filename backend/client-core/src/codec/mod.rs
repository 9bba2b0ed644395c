//! Binary wire format shared with the peer.
//!
//! Every message is one transport frame of the form `[message_type, payload]`.
//! Only [`MESSAGE_TYPE_STATE_UPDATE`] is defined; other types decode to
//! [`Decoded::NoOp`] so newer peers can add messages without breaking us.

use crate::error::codec::CodecError;
use crate::state::ActuatorState;

use common::ErrorLocation;

use std::panic::Location;

/// Message type carrying the actuator state in its payload byte.
pub const MESSAGE_TYPE_STATE_UPDATE: u8 = 1;

/// Length of every frame this client emits, and the minimum it accepts.
pub const FRAME_LEN: usize = 2;

const PAYLOAD_ON: u8 = 1;
const PAYLOAD_OFF: u8 = 0;

/// One outbound wire frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    pub fn message_type(&self) -> u8 {
        self.0[0]
    }

    pub fn payload(&self) -> u8 {
        self.0[1]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Result of decoding an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// The peer reported the actuator state.
    State(ActuatorState),

    /// Unknown message type, accepted and ignored.
    NoOp { message_type: u8 },
}

/// Encode a "set actuator state" command.
pub fn encode_set_state(on: bool) -> Frame {
    let payload = if on { PAYLOAD_ON } else { PAYLOAD_OFF };
    Frame([MESSAGE_TYPE_STATE_UPDATE, payload])
}

/// Decode an inbound frame.
///
/// Only the exact payload byte `1` means on. Bytes past the payload are ignored.
///
/// # Errors
///
/// Returns [`CodecError::MalformedFrame`] when `bytes` is shorter than a
/// type + payload pair.
#[track_caller]
pub fn decode_frame(bytes: &[u8]) -> Result<Decoded, CodecError> {
    let &[message_type, payload, ..] = bytes else {
        return Err(CodecError::MalformedFrame {
            expected: FRAME_LEN,
            actual: bytes.len(),
            location: ErrorLocation::from(Location::caller()),
        });
    };

    match message_type {
        MESSAGE_TYPE_STATE_UPDATE => Ok(Decoded::State(ActuatorState {
            on: payload == PAYLOAD_ON,
        })),
        _ => Ok(Decoded::NoOp { message_type }),
    }
}
