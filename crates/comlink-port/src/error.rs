use comlink_frame::PortId;

use crate::command::CommandFault;

/// Errors raised by memory access backends.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The range is not fully inside one accessible region.
    #[error("range 0x{address:08x}+{len} is not accessible")]
    OutOfRange { address: u32, len: usize },

    /// The range lies in a read-only region.
    #[error("region at 0x{address:08x} is read-only")]
    ReadOnly { address: u32 },

    /// A new region would overlap an existing one.
    #[error("region {name:?} overlaps an existing region")]
    Overlap { name: String },
}

/// Errors that can occur in port and hub operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] comlink_transport::TransportError),

    /// Frame-level error (encoding, queue backpressure).
    #[error("frame error: {0}")]
    Frame(#[from] comlink_frame::FrameError),

    /// Memory access error.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// The interface id does not fit the 4-bit header field.
    #[error("interface {0} out of range (0-15)")]
    InvalidInterface(u8),

    /// The interface already has a handler.
    #[error("interface {0} already enabled")]
    InterfaceInUse(u8),

    /// The interface has no handler.
    #[error("interface {0} not enabled")]
    InterfaceNotEnabled(u8),

    /// No port with this id exists.
    #[error("unknown port {0}")]
    UnknownPort(PortId),

    /// The hub already holds the maximum number of ports.
    #[error("too many ports (max {max})")]
    TooManyPorts { max: usize },

    /// A control command was rejected; an ERROR reply was queued if possible.
    #[error("command {id} rejected: {fault}")]
    Command { id: u8, fault: CommandFault },
}

pub type Result<T> = std::result::Result<T, PortError>;
