//! Device wire framing.
//!
//! The device link is a raw byte stream. Frames are delimited by a single
//! sentinel byte; there is no escaping, so payload bytes must never equal the
//! sentinel. Inbound application frames are exactly two bytes (opcode, value).
//! Outbound frames may be longer (see [`crate::messages::PlayerStateMessage`]).

use crate::{error::WireError, messages::EventMessage};

/// Frame delimiter on the device wire. Chosen to stay clear of the payload
/// byte ranges the hardware emits.
pub const STOP_BYTE: u8 = 125;

/// Length of an inbound application frame: opcode byte plus value byte.
pub const FRAME_LEN: usize = 2;

/// A message that can be serialized onto the device wire.
///
/// `encode_into` appends the payload bytes only; the sentinel is added by
/// [`encode_frame`].
pub trait DeviceWire {
    /// The opcode carried in the first payload byte.
    fn opcode_byte(&self) -> u8;

    fn encode_into(&self, out: &mut Vec<u8>);
}

/// Encode a message into a sentinel-terminated frame.
///
/// Rejects payloads that contain the sentinel byte, since the wire format has
/// no escaping and such a frame would desynchronize the receiver.
pub fn encode_frame<M: DeviceWire>(message: &M) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::with_capacity(8);
    message.encode_into(&mut out);
    if out.contains(&STOP_BYTE) {
        return Err(WireError::ReservedByte(STOP_BYTE));
    }
    out.push(STOP_BYTE);
    Ok(out)
}

/// Parse the payload of one inbound frame (sentinel already stripped).
///
/// Only 2-byte frames are well-formed; anything else is rejected and must be
/// dropped by the caller.
pub fn parse_device_frame(frame: &[u8]) -> Result<EventMessage, WireError> {
    match frame {
        [opcode, value] => Ok(EventMessage {
            opcode: *opcode,
            value: *value,
        }),
        _ => Err(WireError::BadFrameLength(frame.len())),
    }
}
