use bytes::Bytes;

use crate::codec::{HEADER_SIZE, MAX_DATA_SIZE};
use crate::error::{FrameError, Result};
use crate::interface::{is_valid_id, is_valid_interface, INTERFACE_BITS};

/// Index of a port within a hub.
pub type PortId = u8;

/// Two-byte message header.
///
/// Wire layout: byte 0 holds the interface id in the low nibble and the
/// message id in the high nibble; byte 1 is the number of data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub interface: u8,
    pub id: u8,
    pub size: u8,
}

impl Header {
    const NIBBLE: u8 = (1 << INTERFACE_BITS) - 1;

    /// Create a header, validating the 4-bit fields.
    pub fn new(interface: u8, id: u8, size: u8) -> Result<Self> {
        if !is_valid_interface(interface) || !is_valid_id(id) {
            return Err(FrameError::InvalidHeader { interface, id });
        }
        Ok(Self {
            interface,
            id,
            size,
        })
    }

    /// Unpack the interface/id byte and the size byte.
    pub fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        Self {
            interface: bytes[0] & Self::NIBBLE,
            id: bytes[0] >> INTERFACE_BITS,
            size: bytes[1],
        }
    }

    /// Pack into wire order.
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        [
            (self.interface & Self::NIBBLE) | (self.id << INTERFACE_BITS),
            self.size,
        ]
    }
}

/// A complete message, as dispatched to an interface handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub payload: Bytes,
    /// Port the message arrived on, or the port a reply is routed to.
    pub port: PortId,
}

impl Message {
    /// Build a message, validating ids and payload size.
    pub fn new(port: PortId, interface: u8, id: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_DATA_SIZE {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_DATA_SIZE,
            });
        }
        let header = Header::new(interface, id, payload.len() as u8)?;
        Ok(Self {
            header,
            payload,
            port,
        })
    }

    pub fn interface(&self) -> u8 {
        self.header.interface
    }

    pub fn id(&self) -> u8 {
        self.header.id
    }

    /// Build a reply on the same port and interface.
    pub fn reply(&self, id: u8, payload: impl Into<Bytes>) -> Result<Self> {
        Self::new(self.port, self.header.interface, id, payload)
    }
}
