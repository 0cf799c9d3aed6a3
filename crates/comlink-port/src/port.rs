use bytes::BytesMut;
use comlink_frame::{
    encode_message, FrameConfig, Message, Parser, ParserStats, PortId, TxQueue,
    DEFAULT_TX_BUFFER_SIZE, FRAME_LEN_MAX,
};
use comlink_transport::Transport;
use tracing::{trace, warn};

use crate::error::{PortError, Result};

const DEFAULT_READ_CHUNK_SIZE: usize = 64;
const DEFAULT_MAX_READS_PER_POLL: usize = 8;

/// Per-port buffer sizes and polling limits.
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Receive path configuration (receive buffer size).
    pub frame: FrameConfig,
    /// Transmit queue capacity in bytes. Default: 1024.
    pub tx_buffer_size: usize,
    /// Bytes requested from the transport per read. Default: 64.
    pub read_chunk_size: usize,
    /// Upper bound on transport reads per poll tick. Default: 8.
    pub max_reads_per_poll: usize,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            tx_buffer_size: DEFAULT_TX_BUFFER_SIZE,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_reads_per_poll: DEFAULT_MAX_READS_PER_POLL,
        }
    }
}

/// Outcome of one [`Port::receive`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Received {
    pub bytes: usize,
    pub messages: usize,
}

/// One physical link: transport, receive parser and transmit queue.
pub struct Port {
    id: PortId,
    transport: Box<dyn Transport>,
    parser: Parser,
    tx: TxQueue,
    chunk: Vec<u8>,
    scratch: BytesMut,
    config: PortConfig,
}

impl Port {
    /// Create a port with default configuration.
    pub fn new(id: PortId, transport: impl Transport + 'static) -> Self {
        Self::with_config(id, transport, PortConfig::default())
    }

    /// Create a port with explicit configuration.
    pub fn with_config(id: PortId, transport: impl Transport + 'static, config: PortConfig) -> Self {
        Self {
            id,
            transport: Box::new(transport),
            parser: Parser::with_config(id, config.frame.clone()),
            tx: TxQueue::with_capacity(config.tx_buffer_size),
            chunk: vec![0u8; config.read_chunk_size.max(1)],
            scratch: BytesMut::with_capacity(FRAME_LEN_MAX),
            config,
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Perform one non-blocking transport read and feed it to the parser.
    ///
    /// Completed messages are handed to `on_message` before this returns.
    pub fn receive<F>(&mut self, on_message: F) -> Result<Received>
    where
        F: FnMut(Message),
    {
        let bytes = self.transport.receive(&mut self.chunk)?;
        if bytes == 0 {
            return Ok(Received::default());
        }
        trace!(port = self.id, bytes, "received");
        let messages = self.parser.push(&self.chunk[..bytes], on_message);
        Ok(Received { bytes, messages })
    }

    /// Encode `msg` and append it to the transmit queue.
    ///
    /// The message is dropped with [`comlink_frame::FrameError::QueueFull`]
    /// when the queue lacks room for the whole frame.
    pub fn put_message(&mut self, msg: &Message) -> Result<()> {
        self.scratch.clear();
        encode_message(msg, &mut self.scratch)?;
        if let Err(err) = self.tx.push_frame(&self.scratch) {
            warn!(
                port = self.id,
                interface = msg.interface(),
                id = msg.id(),
                %err,
                "dropping outgoing message"
            );
            return Err(err.into());
        }
        Ok(())
    }

    /// Hand queued bytes to the transport. Returns the bytes accepted.
    pub fn send(&mut self) -> Result<usize> {
        Ok(self.tx.drain(&mut self.transport)?)
    }

    /// Bytes waiting in the transmit queue.
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    /// Free space in the transmit queue.
    pub fn tx_available(&self) -> usize {
        self.tx.available()
    }

    pub fn parser_stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// Abandon any partially received frame.
    pub fn reset(&mut self) {
        self.parser.reset();
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id)
            .field("parser", &self.parser)
            .field("queued", &self.tx.len())
            .finish_non_exhaustive()
    }
}

/// Handle through which interface handlers queue replies.
///
/// Messages are routed by their `port` field, so a reply built with
/// [`Message::reply`] goes back where the request came from.
pub struct Outbox<'a> {
    ports: &'a mut [Port],
}

impl<'a> Outbox<'a> {
    pub fn new(ports: &'a mut [Port]) -> Self {
        Self { ports }
    }

    /// Queue `msg` on the port named by `msg.port`.
    pub fn put_message(&mut self, msg: &Message) -> Result<()> {
        self.ports
            .get_mut(usize::from(msg.port))
            .ok_or(PortError::UnknownPort(msg.port))?
            .put_message(msg)
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }
}
