//! Non-blocking byte transport hooks.
//!
//! The protocol engine never blocks: it pulls whatever bytes are available
//! and pushes as many bytes as the driver will currently accept. This crate
//! defines that contract ([`Transport`]) and a few implementations:
//! - [`MemoryTransport`]: in-process loopback pair, used by tests and demos
//! - [`StreamTransport`]: any `Read + Write` stream
//! - [`serial::open`]: a serial device via `serialport` (behind `serial`)
//!
//! This is the lowest layer of comlink. Everything else builds on top of
//! the [`Transport`] trait provided here.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use traits::{StreamTransport, Transport};
