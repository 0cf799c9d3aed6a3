use comlink_transport::TransportError;

/// Errors that can occur during frame encoding, decoding and queuing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The codec was handed a buffer outside its supported length range.
    #[error("codec input length {len} outside 1..={max}")]
    InvalidCodecLength { len: usize, max: usize },

    /// The encoded buffer violates the stuffing rules.
    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    /// The message data exceeds what a single frame can carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An interface or message id does not fit its 4-bit header field.
    #[error("header field out of range (interface {interface}, id {id})")]
    InvalidHeader { interface: u8, id: u8 },

    /// A decoded frame does not begin with the start byte.
    #[error("frame does not begin with the start byte")]
    MissingStart,

    /// The header size field disagrees with the bytes actually present.
    #[error("declared {declared} data bytes, frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The transmit queue cannot hold the whole frame.
    #[error("transmit queue full ({needed} bytes needed, {available} free)")]
    QueueFull { needed: usize, available: usize },

    /// An I/O error occurred on a stream carrying frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport failed while draining the transmit queue.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
