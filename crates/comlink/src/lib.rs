//! Message framing for byte-oriented serial links.
//!
//! comlink moves small, typed messages over a UART or USB CDC line. Each
//! message is one COBS-encoded frame, so a receiver that joins mid-stream
//! or loses bytes recovers at the next frame delimiter.
//!
//! # Crate Structure
//!
//! - [`transport`]: non-blocking byte transports (serial, streams, in-memory)
//! - [`frame`]: frame codec, receive parser and transmit queue
//! - [`port`]: ports, interface dispatch and the built-in memory commands

/// Re-export transport types.
pub mod transport {
    pub use comlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use comlink_frame::*;
}

/// Re-export port engine types.
pub mod port {
    pub use comlink_port::*;
}
