//! A device-side loop on a real serial port.
//!
//! Exposes a 64-byte status block at 0x2000_0000 whose first four bytes
//! hold a tick counter, and answers READ_FROM / WRITE_TO on interface 0.
//!
//! Run with:
//!   cargo run --example memory-target -- /dev/ttyUSB0
//!
//! From another terminal:
//!   cargo run --features cli -- read /dev/ttyUSB1 --address 0x20000000 --len 4

use std::thread;
use std::time::Duration;

use comlink::port::{Access, Hub, MemoryAccess, MemoryMap};
use comlink::transport::serial;

const STATUS_BASE: u32 = 0x2000_0000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: memory-target <device>")?;

    let mut memory = MemoryMap::new();
    memory.add_region("status", STATUS_BASE, vec![0u8; 64], Access::ReadWrite)?;

    let mut hub = Hub::with_memory(memory);
    hub.add_port(serial::open(&path, serial::DEFAULT_BAUD_RATE)?)?;
    eprintln!("Serving {path}");

    let mut ticks = 0u32;
    loop {
        let report = hub.poll()?;
        if report.failed_ports > 0 {
            return Err(format!("lost {path}").into());
        }
        ticks = ticks.wrapping_add(1);
        hub.memory_mut()
            .write(STATUS_BASE, &ticks.to_le_bytes())?;
        if report.is_idle() {
            thread::sleep(Duration::from_millis(1));
        }
    }
}
