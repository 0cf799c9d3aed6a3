//! Two hubs wired back to back in memory.
//!
//! The "target" hub echoes interface 3 and exposes a small RAM region; the
//! "host" hub sends an echo request and a READ_FROM, then prints what
//! comes back.
//!
//! Run with:
//!   cargo run --example loopback

use std::cell::RefCell;
use std::rc::Rc;

use comlink::frame::{Message, CONTROL, READ_FROM};
use comlink::port::{read_request, Access, Hub, MemoryMap};
use comlink::transport::MemoryTransport;

const ECHO: u8 = 3;
const RAM_BASE: u32 = 0x2000_0000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (host_end, target_end) = MemoryTransport::pair();

    let mut memory = MemoryMap::new();
    memory.add_region("ram", RAM_BASE, b"hello from target".to_vec(), Access::ReadWrite)?;
    let mut target = Hub::with_memory(memory);
    target.add_port(target_end)?;
    target.register_interface(ECHO, |msg, outbox| {
        if let Ok(reply) = msg.reply(msg.id(), msg.payload.clone()) {
            let _ = outbox.put_message(&reply);
        }
    })?;

    let received: Rc<RefCell<Vec<Message>>> = Rc::default();
    let mut host = Hub::new();
    let port = host.add_port(host_end)?;
    for interface in [CONTROL, ECHO] {
        let sink = Rc::clone(&received);
        host.register_interface(interface, move |msg, _| sink.borrow_mut().push(msg.clone()))?;
    }

    host.put_message(&Message::new(port, ECHO, 1, &b"ping"[..])?)?;
    host.put_message(&read_request(port, RAM_BASE, 5)?)?;

    for _ in 0..4 {
        host.poll()?;
        target.poll()?;
    }

    for msg in received.borrow().iter() {
        let text = String::from_utf8_lossy(&msg.payload);
        match (msg.interface(), msg.id()) {
            (CONTROL, READ_FROM) => println!("READ_FROM reply: {text}"),
            (interface, id) => println!("interface {interface} id {id}: {text}"),
        }
    }
    Ok(())
}
