use bytes::{BufMut, BytesMut};
use tracing::{debug, trace};

use crate::cobs;
use crate::codec::{FrameConfig, FRAME_DELIMITER, START_BYTE};
use crate::message::{Header, Message, PortId};

/// Message assembly state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Discarding bytes until the start byte.
    WaitForStart,
    /// Expecting the interface/id byte.
    GetHeader,
    /// Expecting the size byte.
    GetSize,
    /// Collecting `size` data bytes.
    GetData,
}

/// Running counters, mostly useful for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Messages handed to the sink.
    pub messages: u64,
    /// Frames that failed to decode.
    pub decode_errors: u64,
    /// Frames discarded because they overran the receive buffer.
    pub overflows: u64,
    /// Frames that ended before the declared data was complete.
    pub truncated: u64,
    /// Messages whose size field exceeded the data capacity.
    pub oversized: u64,
    /// Frames holding bytes past the end of their message.
    pub length_mismatch: u64,
}

/// Outcome of feeding one decoded byte to the state machine.
enum Step {
    Continue,
    Complete(Message),
    Rejected,
}

/// Incremental receive path for one port.
///
/// Raw bytes are collected until a frame delimiter, the frame is decoded,
/// and the decoded bytes drive the message state machine. Every delimiter
/// resets the state machine, so a frame that was cut short can never
/// swallow bytes of the next one. Inside a frame the size field alone
/// delimits the data; a start byte in the data section is ordinary data.
/// A frame yields at most one message, and only when the size field
/// accounts for every byte after the start byte.
pub struct Parser {
    port: PortId,
    config: FrameConfig,
    state: ParserState,
    header: Header,
    raw: BytesMut,
    decoded: BytesMut,
    data: BytesMut,
    overflow: bool,
    stats: ParserStats,
}

impl Parser {
    /// Create a parser with default configuration.
    pub fn new(port: PortId) -> Self {
        Self::with_config(port, FrameConfig::default())
    }

    /// Create a parser with explicit configuration.
    pub fn with_config(port: PortId, config: FrameConfig) -> Self {
        Self {
            port,
            state: ParserState::WaitForStart,
            header: Header::default(),
            raw: BytesMut::with_capacity(config.rx_buffer_size),
            decoded: BytesMut::with_capacity(config.rx_buffer_size),
            data: BytesMut::with_capacity(config.data_capacity()),
            overflow: false,
            stats: ParserStats::default(),
            config,
        }
    }

    /// Feed freshly received bytes. Any number of bytes, including none, may
    /// be passed; completed messages are handed to `on_message` in order.
    ///
    /// Returns the number of messages completed by this call.
    pub fn push<F>(&mut self, bytes: &[u8], mut on_message: F) -> usize
    where
        F: FnMut(Message),
    {
        let mut completed = 0;
        for &byte in bytes {
            if byte == FRAME_DELIMITER {
                completed += self.end_frame(&mut on_message);
            } else if self.raw.len() < self.config.rx_buffer_size {
                self.raw.put_u8(byte);
            } else if !self.overflow {
                debug!(
                    port = self.port,
                    capacity = self.config.rx_buffer_size,
                    "receive buffer overrun, discarding until next delimiter"
                );
                self.overflow = true;
            }
        }
        completed
    }

    /// Drop any partial frame and message and wait for the next frame.
    pub fn reset(&mut self) {
        self.raw.clear();
        self.data.clear();
        self.overflow = false;
        self.state = ParserState::WaitForStart;
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    /// Number of raw bytes held for the frame in progress.
    pub fn buffered(&self) -> usize {
        self.raw.len()
    }

    fn end_frame<F>(&mut self, on_message: &mut F) -> usize
    where
        F: FnMut(Message),
    {
        if self.overflow {
            self.stats.overflows += 1;
            self.reset();
            return 0;
        }
        if self.raw.is_empty() {
            return 0;
        }

        let mut decoded = std::mem::take(&mut self.decoded);
        decoded.clear();
        let result = cobs::decode(&self.raw, &mut decoded);
        self.raw.clear();

        let mut completed = 0;
        match result {
            Ok(_) => {
                if let Some(msg) = self.assemble(&decoded) {
                    completed = 1;
                    on_message(msg);
                }
            }
            Err(err) => {
                self.stats.decode_errors += 1;
                debug!(port = self.port, %err, "dropping undecodable frame");
            }
        }
        self.decoded = decoded;

        if self.state != ParserState::WaitForStart {
            self.stats.truncated += 1;
            debug!(
                port = self.port,
                state = ?self.state,
                "frame ended mid-message, dropping partial message"
            );
            self.data.clear();
            self.state = ParserState::WaitForStart;
        }
        completed
    }

    /// Run one decoded frame through the state machine. A frame carries at
    /// most one message: once the message completes or is rejected, the
    /// rest of the frame is not scanned, and any bytes left over void the
    /// message.
    fn assemble(&mut self, decoded: &[u8]) -> Option<Message> {
        for (i, &byte) in decoded.iter().enumerate() {
            match self.step(byte) {
                Step::Continue => {}
                Step::Rejected => return None,
                Step::Complete(msg) => {
                    let trailing = decoded.len() - i - 1;
                    if trailing > 0 {
                        self.stats.length_mismatch += 1;
                        debug!(
                            port = self.port,
                            size = msg.header.size,
                            trailing,
                            "frame longer than its size field, dropping message"
                        );
                        return None;
                    }
                    self.stats.messages += 1;
                    return Some(msg);
                }
            }
        }
        None
    }

    fn step(&mut self, byte: u8) -> Step {
        match self.state {
            ParserState::WaitForStart => {
                if byte == START_BYTE {
                    self.state = ParserState::GetHeader;
                } else {
                    trace!(port = self.port, byte, "skipping byte outside message");
                }
                Step::Continue
            }
            ParserState::GetHeader => {
                self.header = Header::from_bytes([byte, 0]);
                self.state = ParserState::GetSize;
                Step::Continue
            }
            ParserState::GetSize => {
                self.header.size = byte;
                self.data.clear();
                if byte == 0 {
                    self.state = ParserState::WaitForStart;
                    return Step::Complete(self.complete());
                }
                if usize::from(byte) > self.config.data_capacity() {
                    self.stats.oversized += 1;
                    debug!(
                        port = self.port,
                        size = byte,
                        capacity = self.config.data_capacity(),
                        "size field exceeds receive capacity, dropping frame"
                    );
                    self.state = ParserState::WaitForStart;
                    return Step::Rejected;
                }
                self.state = ParserState::GetData;
                Step::Continue
            }
            ParserState::GetData => {
                self.data.put_u8(byte);
                if self.data.len() == usize::from(self.header.size) {
                    self.state = ParserState::WaitForStart;
                    return Step::Complete(self.complete());
                }
                Step::Continue
            }
        }
    }

    fn complete(&mut self) -> Message {
        Message {
            header: self.header,
            payload: self.data.split().freeze(),
            port: self.port,
        }
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("port", &self.port)
            .field("state", &self.state)
            .field("buffered", &self.raw.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_frame, MAX_DATA_SIZE};

    fn wire(interface: u8, id: u8, data: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(interface, id, data, &mut buf).unwrap();
        buf.to_vec()
    }

    fn raw_frame(decoded: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        cobs::encode(decoded, &mut buf).unwrap();
        buf.put_u8(FRAME_DELIMITER);
        buf.to_vec()
    }

    fn collect(parser: &mut Parser, bytes: &[u8]) -> Vec<Message> {
        let mut out = Vec::new();
        parser.push(bytes, |msg| out.push(msg));
        out
    }

    #[test]
    fn parses_single_frame() {
        let mut parser = Parser::new(0);
        let msgs = collect(&mut parser, &wire(3, 1, b"abc"));

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].interface(), 3);
        assert_eq!(msgs[0].id(), 1);
        assert_eq!(msgs[0].payload.as_ref(), b"abc");
        assert_eq!(parser.state(), ParserState::WaitForStart);
    }

    #[test]
    fn byte_at_a_time() {
        let mut parser = Parser::new(2);
        let bytes = wire(1, 4, &[0x00, 0x73, 0xFF]);
        let mut out = Vec::new();

        for (i, byte) in bytes.iter().enumerate() {
            let n = parser.push(std::slice::from_ref(byte), |msg| out.push(msg));
            assert_eq!(n, usize::from(i + 1 == bytes.len()));
        }

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].port, 2);
        assert_eq!(out[0].payload.as_ref(), &[0x00, 0x73, 0xFF]);
    }

    #[test]
    fn empty_push_is_a_no_op() {
        let mut parser = Parser::new(0);
        assert_eq!(parser.push(&[], |_| panic!("no message expected")), 0);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn arbitrary_chunk_boundaries() {
        let mut stream = Vec::new();
        stream.extend(wire(1, 1, b"first"));
        stream.extend(wire(2, 2, &[0u8; 40]));
        stream.extend(wire(3, 3, b""));

        for chunk in 1..=9 {
            let mut parser = Parser::new(0);
            let mut out = Vec::new();
            for piece in stream.chunks(chunk) {
                parser.push(piece, |msg| out.push(msg));
            }
            let ids: Vec<u8> = out.iter().map(Message::id).collect();
            assert_eq!(ids, [1, 2, 3], "chunk size {chunk}");
            assert_eq!(out[1].payload.len(), 40);
        }
    }

    #[test]
    fn zero_size_dispatches_empty_payload() {
        let mut parser = Parser::new(0);
        let msgs = collect(&mut parser, &wire(5, 2, b""));

        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].payload.is_empty());
        assert_eq!(msgs[0].header.size, 0);
        assert_eq!(parser.state(), ParserState::WaitForStart);
    }

    #[test]
    fn truncated_frame_is_dropped_and_next_frame_parses() {
        let mut stream = raw_frame(&[START_BYTE, 0x01, 10, 1, 2, 3]);
        stream.extend(wire(1, 2, b"ok"));

        let mut parser = Parser::new(0);
        let msgs = collect(&mut parser, &stream);

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].payload.as_ref(), b"ok");
        assert_eq!(parser.stats().truncated, 1);
        assert_eq!(parser.stats().messages, 1);
    }

    #[test]
    fn start_byte_inside_data_is_data() {
        let data = [START_BYTE, 0x01, 0x02, START_BYTE];
        let mut parser = Parser::new(0);
        let msgs = collect(&mut parser, &wire(4, 4, &data));

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].payload.as_ref(), &data);
    }

    #[test]
    fn start_byte_as_size_is_a_size() {
        let data = vec![0xABu8; usize::from(START_BYTE)];
        let mut parser = Parser::new(0);
        let msgs = collect(&mut parser, &wire(1, 1, &data));

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].header.size, START_BYTE);
    }

    #[test]
    fn noise_before_start_is_skipped() {
        let mut parser = Parser::new(0);
        let msgs = collect(
            &mut parser,
            &raw_frame(&[0x10, 0x20, START_BYTE, 0x21, 1, 0x99]),
        );

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].interface(), 1);
        assert_eq!(msgs[0].id(), 2);
        assert_eq!(msgs[0].payload.as_ref(), &[0x99]);
    }

    #[test]
    fn undecodable_frame_is_dropped() {
        let mut stream = vec![0x09, 0x01, 0x02, FRAME_DELIMITER];
        stream.extend(wire(1, 1, b"after"));

        let mut parser = Parser::new(0);
        let msgs = collect(&mut parser, &stream);

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].payload.as_ref(), b"after");
        assert_eq!(parser.stats().decode_errors, 1);
    }

    #[test]
    fn overrun_discards_until_delimiter() {
        let mut stream = vec![0x42u8; 600];
        stream.push(FRAME_DELIMITER);
        stream.extend(wire(1, 1, b"fresh"));

        let mut parser = Parser::new(0);
        let msgs = collect(&mut parser, &stream);

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].payload.as_ref(), b"fresh");
        assert_eq!(parser.stats().overflows, 1);
    }

    #[test]
    fn size_beyond_capacity_is_rejected() {
        let config = FrameConfig { rx_buffer_size: 8 };
        let mut parser = Parser::with_config(0, config);

        let mut stream = raw_frame(&[START_BYTE, 0x01, 9, 1, 2, 3, 4]);
        stream.extend(wire(1, 1, b"tiny"));
        let msgs = collect(&mut parser, &stream);

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].payload.as_ref(), b"tiny");
        assert_eq!(parser.stats().oversized, 1);
    }

    #[test]
    fn rejected_size_does_not_rescan_rest_of_frame() {
        // The bytes after an out-of-range size spell a WRITE_TO for
        // interface 0; none of them may surface as a message.
        let mut parser = Parser::new(0);
        let msgs = collect(
            &mut parser,
            &raw_frame(&[START_BYTE, 0x13, 0xFF, START_BYTE, 0x10, 0x01, 0x42]),
        );

        assert!(msgs.is_empty());
        assert_eq!(parser.stats().oversized, 1);
        assert_eq!(parser.stats().messages, 0);
        assert_eq!(parser.state(), ParserState::WaitForStart);
    }

    #[test]
    fn frame_longer_than_size_is_dropped() {
        let mut stream = raw_frame(&[
            START_BYTE, 0x13, 0x01, 0xAA, START_BYTE, 0x10, 0x01, 0x42,
        ]);
        stream.extend(raw_frame(&[START_BYTE, 0x23, 0x00, 0x07]));
        stream.extend(wire(3, 1, b"ok"));

        let mut parser = Parser::new(0);
        let msgs = collect(&mut parser, &stream);

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].payload.as_ref(), b"ok");
        assert_eq!(parser.stats().length_mismatch, 2);
        assert_eq!(parser.stats().messages, 1);
    }

    #[test]
    fn frame_shorter_than_size_is_dropped() {
        let mut stream = raw_frame(&[START_BYTE, 0x13, 0x04, 0xAA, 0xBB]);
        stream.extend(raw_frame(&[START_BYTE, 0x13]));
        stream.extend(wire(3, 2, b""));

        let mut parser = Parser::new(0);
        let msgs = collect(&mut parser, &stream);

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id(), 2);
        assert_eq!(parser.stats().truncated, 2);
        assert_eq!(parser.stats().length_mismatch, 0);
    }

    #[test]
    fn largest_message_parses() {
        let data = vec![0x5Au8; MAX_DATA_SIZE];
        let mut parser = Parser::new(0);
        let msgs = collect(&mut parser, &wire(15, 15, &data));

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].payload.len(), MAX_DATA_SIZE);
    }

    #[test]
    fn reset_drops_partial_frame() {
        let bytes = wire(1, 1, b"partial");
        let mut parser = Parser::new(0);
        parser.push(&bytes[..4], |_| panic!("incomplete"));
        assert_eq!(parser.buffered(), 4);

        parser.reset();
        assert_eq!(parser.buffered(), 0);
        let msgs = collect(&mut parser, &bytes);
        assert_eq!(msgs.len(), 1);
    }
}
