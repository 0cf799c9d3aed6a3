//! Self-synchronizing message framing for byte-at-a-time serial links.
//!
//! Every message travels as one COBS-encoded frame terminated by 0x00:
//! - A start byte (`'s'`)
//! - An interface/id byte (4 bits each) for multiplexing
//! - A size byte followed by up to 251 data bytes
//!
//! Corruption costs at most the frame it lands in; the parser resumes at
//! the next delimiter.

pub mod cobs;
pub mod codec;
pub mod error;
pub mod interface;
pub mod message;
pub mod parser;
pub mod queue;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    decode_frame, encode_frame, encode_message, FrameConfig, DEFAULT_RX_BUFFER_SIZE,
    FRAME_DELIMITER, FRAME_LEN_MAX, HEADER_SIZE, MAX_DATA_SIZE, PACKET_OVERHEAD, START_BYTE,
};
pub use error::{FrameError, Result};
pub use interface::{CONTROL, ERROR, NUM_IDS, NUM_INTERFACES, READ_FROM, WRITE_TO};
pub use message::{Header, Message, PortId};
pub use parser::{Parser, ParserState, ParserStats};
pub use queue::{TxQueue, DEFAULT_TX_BUFFER_SIZE};

#[cfg(feature = "async")]
pub use async_codec::MessageCodec;
