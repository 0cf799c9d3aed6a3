//! Port engine for comlink links.
//!
//! A [`Hub`] owns a set of [`Port`]s, each pairing a transport with a
//! receive parser and a bounded transmit queue. Every call to
//! [`Hub::poll`] reads what the transports have, routes complete messages
//! to the handler registered for their interface, and flushes queued
//! replies.
//!
//! Interface 0 falls back to a built-in [`Commander`] that serves
//! READ_FROM / WRITE_TO requests against a [`MemoryAccess`] backend.
//!
//! ```no_run
//! use comlink_port::{Access, Hub, MemoryMap};
//! use comlink_transport::MemoryTransport;
//!
//! let mut memory = MemoryMap::new();
//! memory.add_region("status", 0x2000_0000, vec![0u8; 64], Access::ReadWrite)?;
//!
//! let (near, _far) = MemoryTransport::pair();
//! let mut hub = Hub::with_memory(memory);
//! hub.add_port(near)?;
//! hub.register_interface(3, |msg, outbox| {
//!     if let Ok(reply) = msg.reply(1, msg.payload.clone()) {
//!         let _ = outbox.put_message(&reply);
//!     }
//! })?;
//!
//! loop {
//!     hub.poll()?;
//! }
//! # Ok::<(), comlink_port::PortError>(())
//! ```

pub mod command;
pub mod error;
pub mod hub;
pub mod memory;
pub mod port;
pub mod registry;

pub use command::{
    error_reply, parse_error, read_request, write_request, CommandFault, Commander, MemoryRange,
    MAX_WRITE_SIZE, MEMORY_RANGE_SIZE,
};
pub use error::{MemoryError, PortError, Result};
pub use hub::{Hub, PollReport, MAX_PORTS};
pub use memory::{Access, MemoryAccess, MemoryMap, Region};
pub use port::{Outbox, Port, PortConfig, Received};
pub use registry::{InterfaceCallback, InterfaceRegistry};

#[cfg(feature = "raw-memory")]
pub use memory::RawMemory;
