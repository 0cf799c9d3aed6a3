//! Built-in memory access commands on the control interface.
//!
//! Request payloads start with a memory range, little-endian:
//!
//! ```text
//! ┌──────────────┬───────────┬─────────────────────────────┐
//! │ address (4B) │ len (2B)  │ data (len bytes, WRITE_TO)  │
//! └──────────────┴───────────┴─────────────────────────────┘
//! ```
//!
//! READ_FROM is answered with a READ_FROM message carrying the bytes read.
//! WRITE_TO is silent on success. Any rejected request is answered with an
//! ERROR message whose payload is `[request id, fault code]`.

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use comlink_frame::{Message, PortId, CONTROL, ERROR, MAX_DATA_SIZE, READ_FROM, WRITE_TO};
use tracing::{debug, warn};

use crate::error::{PortError, Result};
use crate::memory::MemoryAccess;
use crate::port::Outbox;

/// Encoded size of a [`MemoryRange`].
pub const MEMORY_RANGE_SIZE: usize = 6;

/// Largest data section a single WRITE_TO can carry.
pub const MAX_WRITE_SIZE: usize = MAX_DATA_SIZE - MEMORY_RANGE_SIZE;

/// Address range named by a memory command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub address: u32,
    pub len: u16,
}

impl MemoryRange {
    /// Parse the range at the front of `payload`.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() < MEMORY_RANGE_SIZE {
            return None;
        }
        let mut buf = &payload[..MEMORY_RANGE_SIZE];
        Some(Self {
            address: buf.get_u32_le(),
            len: buf.get_u16_le(),
        })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.address);
        dst.put_u16_le(self.len);
    }
}

/// Reason a control command was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandFault {
    /// Payload too short or inconsistent with its declared length.
    Malformed = 1,
    /// Requested range exceeds what one message can carry.
    TooLarge = 2,
    /// Range is outside accessible memory, or read-only for WRITE_TO.
    AccessDenied = 3,
    /// Unsupported control message id.
    UnknownCommand = 4,
}

impl CommandFault {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Malformed),
            2 => Some(Self::TooLarge),
            3 => Some(Self::AccessDenied),
            4 => Some(Self::UnknownCommand),
            _ => None,
        }
    }
}

impl fmt::Display for CommandFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Malformed => "malformed request",
            Self::TooLarge => "range too large",
            Self::AccessDenied => "access denied",
            Self::UnknownCommand => "unknown command",
        };
        f.write_str(text)
    }
}

/// Build a READ_FROM request.
pub fn read_request(port: PortId, address: u32, len: u16) -> Result<Message> {
    let mut payload = BytesMut::with_capacity(MEMORY_RANGE_SIZE);
    MemoryRange { address, len }.encode(&mut payload);
    Ok(Message::new(port, CONTROL, READ_FROM, payload.freeze())?)
}

/// Build a WRITE_TO request carrying `data`.
pub fn write_request(port: PortId, address: u32, data: &[u8]) -> Result<Message> {
    let len = u16::try_from(data.len()).unwrap_or(u16::MAX);
    let mut payload = BytesMut::with_capacity(MEMORY_RANGE_SIZE + data.len());
    MemoryRange { address, len }.encode(&mut payload);
    payload.put_slice(data);
    Ok(Message::new(port, CONTROL, WRITE_TO, payload.freeze())?)
}

/// Build the ERROR reply for a rejected request.
pub fn error_reply(request: &Message, fault: CommandFault) -> Result<Message> {
    Ok(Message::new(
        request.port,
        CONTROL,
        ERROR,
        vec![request.id(), fault.code()],
    )?)
}

/// Parse an ERROR payload into the failed request id and fault.
pub fn parse_error(payload: &[u8]) -> Option<(u8, CommandFault)> {
    match payload {
        [id, code, ..] => Some((*id, CommandFault::from_code(*code)?)),
        _ => None,
    }
}

/// Executes control-interface commands against a memory backend.
#[derive(Debug)]
pub struct Commander<M> {
    memory: M,
}

impl<M: MemoryAccess> Commander<M> {
    pub fn new(memory: M) -> Self {
        Self { memory }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// Execute one control message, queuing any reply through `outbox`.
    ///
    /// A rejected command queues an ERROR reply (dropped if the queue is
    /// full) and returns [`PortError::Command`].
    pub fn handle(&mut self, msg: &Message, outbox: &mut Outbox<'_>) -> Result<()> {
        let outcome = match msg.id() {
            ERROR => {
                debug!(port = msg.port, payload = ?msg.payload.as_ref(), "peer reported error");
                return Ok(());
            }
            WRITE_TO => self.write_to(msg).map(|()| None),
            READ_FROM => self.read_from(msg).map(Some),
            _ => Err(CommandFault::UnknownCommand),
        };

        match outcome {
            Ok(Some(reply)) => outbox.put_message(&reply),
            Ok(None) => Ok(()),
            Err(fault) => {
                warn!(port = msg.port, id = msg.id(), %fault, "control command rejected");
                let reply = error_reply(msg, fault)?;
                if let Err(err) = outbox.put_message(&reply) {
                    warn!(port = msg.port, %err, "ERROR reply dropped");
                }
                Err(PortError::Command { id: msg.id(), fault })
            }
        }
    }

    fn read_from(&mut self, msg: &Message) -> std::result::Result<Message, CommandFault> {
        if msg.payload.len() != MEMORY_RANGE_SIZE {
            return Err(CommandFault::Malformed);
        }
        let range = MemoryRange::decode(&msg.payload).ok_or(CommandFault::Malformed)?;
        let len = usize::from(range.len);
        if len > MAX_DATA_SIZE {
            return Err(CommandFault::TooLarge);
        }

        let mut data = vec![0u8; len];
        self.memory
            .read(range.address, &mut data)
            .map_err(|err| {
                debug!(%err, "READ_FROM denied");
                CommandFault::AccessDenied
            })?;

        Message::new(msg.port, CONTROL, READ_FROM, data).map_err(|_| CommandFault::TooLarge)
    }

    fn write_to(&mut self, msg: &Message) -> std::result::Result<(), CommandFault> {
        let range = MemoryRange::decode(&msg.payload).ok_or(CommandFault::Malformed)?;
        let data = &msg.payload[MEMORY_RANGE_SIZE..];
        let len = usize::from(range.len);
        if len > data.len() {
            return Err(CommandFault::Malformed);
        }

        self.memory
            .write(range.address, &data[..len])
            .map_err(|err| {
                debug!(%err, "WRITE_TO denied");
                CommandFault::AccessDenied
            })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use comlink_frame::decode_frame;
    use comlink_transport::MemoryTransport;

    use super::*;
    use crate::memory::{Access, MemoryMap};
    use crate::port::Port;

    const RAM: u32 = 0x2000_0000;

    fn setup() -> (Commander<MemoryMap>, Vec<Port>, MemoryTransport) {
        let mut map = MemoryMap::new();
        map.add_region("ram", RAM, (0u8..32).collect::<Vec<_>>(), Access::ReadWrite)
            .unwrap();
        map.add_region("rom", 0x0800_0000, vec![0xEE; 8], Access::ReadOnly)
            .unwrap();
        let (near, far) = MemoryTransport::pair();
        (Commander::new(map), vec![Port::new(0, near)], far)
    }

    fn sent(ports: &mut [Port], far: &mut MemoryTransport) -> Vec<Message> {
        ports[0].send().unwrap();
        let mut buf = [0u8; 1024];
        let n = comlink_transport::Transport::receive(far, &mut buf).unwrap();
        buf[..n]
            .split(|&b| b == 0)
            .filter(|frame| !frame.is_empty())
            .map(|frame| decode_frame(frame, 0).unwrap())
            .collect()
    }

    #[test]
    fn memory_range_layout() {
        let mut buf = BytesMut::new();
        MemoryRange {
            address: 0x2000_0010,
            len: 4,
        }
        .encode(&mut buf);
        assert_eq!(buf.as_ref(), &[0x10, 0x00, 0x00, 0x20, 0x04, 0x00]);
        assert_eq!(
            MemoryRange::decode(&buf),
            Some(MemoryRange {
                address: 0x2000_0010,
                len: 4
            })
        );
        assert_eq!(MemoryRange::decode(&buf[..5]), None);
    }

    #[test]
    fn read_from_replies_with_bytes() {
        let (mut commander, mut ports, mut far) = setup();
        let request = read_request(0, RAM + 4, 4).unwrap();

        commander
            .handle(&request, &mut Outbox::new(&mut ports))
            .unwrap();

        let replies = sent(&mut ports, &mut far);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].interface(), CONTROL);
        assert_eq!(replies[0].id(), READ_FROM);
        assert_eq!(replies[0].payload.as_ref(), &[4, 5, 6, 7]);
    }

    #[test]
    fn write_to_updates_memory_without_reply() {
        let (mut commander, mut ports, _far) = setup();
        let request = write_request(0, RAM, &[0x11, 0x22]).unwrap();

        commander
            .handle(&request, &mut Outbox::new(&mut ports))
            .unwrap();

        let mut out = [0u8; 2];
        commander.memory().read(RAM, &mut out).unwrap();
        assert_eq!(out, [0x11, 0x22]);
        assert_eq!(ports[0].queued(), 0);
    }

    #[test]
    fn oversized_read_gets_error_reply() {
        let (mut commander, mut ports, mut far) = setup();
        let request = read_request(0, RAM, (MAX_DATA_SIZE + 1) as u16).unwrap();

        let err = commander
            .handle(&request, &mut Outbox::new(&mut ports))
            .unwrap_err();
        assert!(matches!(
            err,
            PortError::Command {
                id: READ_FROM,
                fault: CommandFault::TooLarge
            }
        ));

        let replies = sent(&mut ports, &mut far);
        assert_eq!(replies[0].id(), ERROR);
        assert_eq!(
            parse_error(&replies[0].payload),
            Some((READ_FROM, CommandFault::TooLarge))
        );
    }

    #[test]
    fn write_longer_than_payload_is_malformed() {
        let (mut commander, mut ports, mut far) = setup();
        let mut payload = BytesMut::new();
        MemoryRange {
            address: RAM,
            len: 10,
        }
        .encode(&mut payload);
        payload.put_slice(&[1, 2, 3]);
        let request = Message::new(0, CONTROL, WRITE_TO, payload.freeze()).unwrap();

        assert!(commander
            .handle(&request, &mut Outbox::new(&mut ports))
            .is_err());

        let replies = sent(&mut ports, &mut far);
        assert_eq!(
            parse_error(&replies[0].payload),
            Some((WRITE_TO, CommandFault::Malformed))
        );
        let mut out = [0u8; 3];
        commander.memory().read(RAM, &mut out).unwrap();
        assert_eq!(out, [0, 1, 2]);
    }

    #[test]
    fn read_only_and_unmapped_ranges_are_denied() {
        let (mut commander, mut ports, mut far) = setup();
        let write_rom = write_request(0, 0x0800_0000, &[0]).unwrap();
        let read_hole = read_request(0, 0x4000_0000, 1).unwrap();

        assert!(commander
            .handle(&write_rom, &mut Outbox::new(&mut ports))
            .is_err());
        assert!(commander
            .handle(&read_hole, &mut Outbox::new(&mut ports))
            .is_err());

        let faults: Vec<_> = sent(&mut ports, &mut far)
            .iter()
            .map(|m| parse_error(&m.payload))
            .collect();
        assert_eq!(
            faults,
            [
                Some((WRITE_TO, CommandFault::AccessDenied)),
                Some((READ_FROM, CommandFault::AccessDenied))
            ]
        );
    }

    #[test]
    fn unknown_id_and_short_payload() {
        let (mut commander, mut ports, mut far) = setup();
        let unknown = Message::new(0, CONTROL, 9, Bytes::new()).unwrap();
        let short = Message::new(0, CONTROL, READ_FROM, Bytes::from_static(&[1, 2])).unwrap();

        assert!(commander.handle(&unknown, &mut Outbox::new(&mut ports)).is_err());
        assert!(commander.handle(&short, &mut Outbox::new(&mut ports)).is_err());

        let faults: Vec<_> = sent(&mut ports, &mut far)
            .iter()
            .map(|m| parse_error(&m.payload))
            .collect();
        assert_eq!(
            faults,
            [
                Some((9, CommandFault::UnknownCommand)),
                Some((READ_FROM, CommandFault::Malformed))
            ]
        );
    }

    #[test]
    fn inbound_error_is_ignored() {
        let (mut commander, mut ports, _far) = setup();
        let msg = Message::new(0, CONTROL, ERROR, vec![2, 3]).unwrap();
        commander.handle(&msg, &mut Outbox::new(&mut ports)).unwrap();
        assert_eq!(ports[0].queued(), 0);
    }

    #[test]
    fn fault_codes_roundtrip() {
        for fault in [
            CommandFault::Malformed,
            CommandFault::TooLarge,
            CommandFault::AccessDenied,
            CommandFault::UnknownCommand,
        ] {
            assert_eq!(CommandFault::from_code(fault.code()), Some(fault));
        }
        assert_eq!(CommandFault::from_code(0), None);
    }

    #[test]
    fn write_request_rejects_oversized_data() {
        let err = write_request(0, RAM, &[0u8; MAX_WRITE_SIZE + 1]).unwrap_err();
        assert!(matches!(err, PortError::Frame(_)));
        assert!(write_request(0, RAM, &[0u8; MAX_WRITE_SIZE]).is_ok());
    }
}
