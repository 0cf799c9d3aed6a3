//! Blocking helpers for one-shot host commands over a single port.

use std::thread;
use std::time::{Duration, Instant};

use comlink_frame::Message;
use comlink_port::Port;
use comlink_transport::serial;
use tracing::debug;

use crate::cmd::DeviceArgs;
use crate::exit::{port_error, transport_error, CliError, CliResult, TIMEOUT};

const IDLE_BACKOFF: Duration = Duration::from_millis(1);

pub fn open(args: &DeviceArgs) -> CliResult<Port> {
    let transport = serial::open(&args.device, args.baud)
        .map_err(|err| transport_error("open failed", err))?;
    Ok(Port::new(0, transport))
}

/// Queue `msg` and push it onto the line.
pub fn send(port: &mut Port, msg: &Message, timeout: Duration) -> CliResult<()> {
    port.put_message(msg)
        .map_err(|err| port_error("send failed", err))?;
    flush(port, timeout)
}

/// Drain the transmit queue, giving up after `timeout`.
pub fn flush(port: &mut Port, timeout: Duration) -> CliResult<()> {
    let deadline = Instant::now() + timeout;
    while port.queued() > 0 {
        let sent = port.send().map_err(|err| port_error("send failed", err))?;
        if sent == 0 {
            if Instant::now() >= deadline {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("transmit stalled with {} bytes queued", port.queued()),
                ));
            }
            thread::sleep(IDLE_BACKOFF);
        }
    }
    Ok(())
}

/// Read until a message satisfying `accept` arrives or `timeout` elapses.
///
/// Messages that do not match are logged and discarded.
pub fn wait_for<F>(port: &mut Port, timeout: Duration, mut accept: F) -> CliResult<Option<Message>>
where
    F: FnMut(&Message) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let mut found = None;
        let received = port
            .receive(|msg| {
                if found.is_none() && accept(&msg) {
                    found = Some(msg);
                } else {
                    debug!(interface = msg.interface(), id = msg.id(), "ignoring message");
                }
            })
            .map_err(|err| port_error("receive failed", err))?;

        if found.is_some() {
            return Ok(found);
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        if received.bytes == 0 {
            thread::sleep(IDLE_BACKOFF);
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use comlink_frame::encode_frame;
    use comlink_transport::MemoryTransport;

    use super::*;

    #[test]
    fn wait_for_skips_unmatched_messages() {
        let (near, _far) = MemoryTransport::pair();
        let mut port = Port::new(0, near.clone());
        let mut wire = BytesMut::new();
        encode_frame(4, 1, b"skip", &mut wire).unwrap();
        encode_frame(5, 2, b"take", &mut wire).unwrap();
        near.inject(&wire);

        let msg = wait_for(&mut port, Duration::from_millis(50), |m| m.interface() == 5)
            .unwrap()
            .expect("message on interface 5");
        assert_eq!(msg.payload.as_ref(), b"take");
    }

    #[test]
    fn wait_for_times_out_quietly() {
        let (near, _far) = MemoryTransport::pair();
        let mut port = Port::new(0, near);
        let found = wait_for(&mut port, Duration::from_millis(5), |_| true).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn send_flushes_everything() {
        let (near, far) = MemoryTransport::pair();
        let mut port = Port::new(0, near.with_send_budget(2));
        let msg = Message::new(0, 3, 1, vec![9u8; 10]).unwrap();

        send(&mut port, &msg, Duration::from_millis(50)).unwrap();
        assert_eq!(port.queued(), 0);
        assert!(far.pending() > 10);
    }

    #[test]
    fn stalled_transport_times_out() {
        let (near, _far) = MemoryTransport::pair();
        let mut port = Port::new(0, near.with_send_budget(0));
        let msg = Message::new(0, 3, 1, vec![1u8]).unwrap();

        let err = send(&mut port, &msg, Duration::from_millis(5)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }
}
