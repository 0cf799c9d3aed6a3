use bytes::{BufMut, BytesMut};

use crate::cobs;
use crate::error::{FrameError, Result};
use crate::message::{Header, Message, PortId};

/// Start-of-message byte inside a decoded frame.
pub const START_BYTE: u8 = b's';

/// Frame delimiter on the wire. Never appears inside an encoded frame.
pub const FRAME_DELIMITER: u8 = 0x00;

/// Header: interface/id (1) + size (1) = 2 bytes.
pub const HEADER_SIZE: usize = 2;

/// Start byte plus header.
pub const PACKET_OVERHEAD: usize = 1 + HEADER_SIZE;

/// Largest frame on the wire, delimiter included.
pub const FRAME_LEN_MAX: usize = 256;

/// Largest data section a single message can carry.
pub const MAX_DATA_SIZE: usize = cobs::MAX_INPUT_LEN - PACKET_OVERHEAD;

/// Default per-port receive buffer size.
pub const DEFAULT_RX_BUFFER_SIZE: usize = 512;

/// Encode one message into the wire format and append it to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────────────────────────────────┬───────────┐
/// │ COBS( 's' │ iface|id (1B) │ size (1B) │ data (size) ) │ 0x00      │
/// └──────────────────────────────────────────────────────┴───────────┘
/// ```
///
/// Returns the number of bytes appended, delimiter included.
pub fn encode_frame(interface: u8, id: u8, data: &[u8], dst: &mut BytesMut) -> Result<usize> {
    if data.len() > MAX_DATA_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: data.len(),
            max: MAX_DATA_SIZE,
        });
    }
    let header = Header::new(interface, id, data.len() as u8)?;

    let mut raw = [0u8; cobs::MAX_INPUT_LEN];
    raw[0] = START_BYTE;
    raw[1..PACKET_OVERHEAD].copy_from_slice(&header.to_bytes());
    raw[PACKET_OVERHEAD..PACKET_OVERHEAD + data.len()].copy_from_slice(data);

    let encoded = cobs::encode(&raw[..PACKET_OVERHEAD + data.len()], dst)?;
    dst.put_u8(FRAME_DELIMITER);
    Ok(encoded + 1)
}

/// Encode a [`Message`] into the wire format.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) -> Result<usize> {
    encode_frame(msg.header.interface, msg.header.id, &msg.payload, dst)
}

/// Decode exactly one frame (delimiter already stripped) into a message.
///
/// Stricter than the streaming [`crate::Parser`]: the decoded bytes must be
/// a start byte, a header and exactly `size` data bytes.
pub fn decode_frame(encoded: &[u8], port: PortId) -> Result<Message> {
    let mut raw = BytesMut::with_capacity(encoded.len());
    cobs::decode(encoded, &mut raw)?;

    if raw.first() != Some(&START_BYTE) {
        return Err(FrameError::MissingStart);
    }
    if raw.len() < PACKET_OVERHEAD {
        return Err(FrameError::Malformed("frame shorter than header"));
    }

    let header = Header::from_bytes([raw[1], raw[2]]);
    let actual = raw.len() - PACKET_OVERHEAD;
    if usize::from(header.size) != actual {
        return Err(FrameError::LengthMismatch {
            declared: usize::from(header.size),
            actual,
        });
    }

    let _ = raw.split_to(PACKET_OVERHEAD);
    Ok(Message {
        header,
        payload: raw.freeze(),
        port,
    })
}

/// Configuration for the receive path.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Receive buffer capacity in bytes. Default: 512.
    pub rx_buffer_size: usize,
}

impl FrameConfig {
    /// Largest data section the parser will accept.
    pub fn data_capacity(&self) -> usize {
        self.rx_buffer_size.min(MAX_DATA_SIZE)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            rx_buffer_size: DEFAULT_RX_BUFFER_SIZE,
        }
    }
}
