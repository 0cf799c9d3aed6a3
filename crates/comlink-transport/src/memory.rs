use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, BytesMut};

use crate::error::Result;
use crate::traits::Transport;

type Line = Arc<Mutex<BytesMut>>;

/// In-process byte line.
///
/// [`MemoryTransport::pair`] returns two ends wired back to back: bytes sent
/// on one end are received on the other. An optional per-call send budget
/// models a driver that only accepts a few bytes at a time.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    rx: Line,
    tx: Line,
    send_budget: Option<usize>,
}

impl MemoryTransport {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let a: Line = Arc::new(Mutex::new(BytesMut::new()));
        let b: Line = Arc::new(Mutex::new(BytesMut::new()));
        (
            Self {
                rx: Arc::clone(&a),
                tx: Arc::clone(&b),
                send_budget: None,
            },
            Self {
                rx: b,
                tx: a,
                send_budget: None,
            },
        )
    }

    /// Limit the number of bytes accepted by each `send` call.
    pub fn with_send_budget(mut self, budget: usize) -> Self {
        self.send_budget = Some(budget);
        self
    }

    /// Place bytes on this end's receive line, as if the peer had sent them.
    pub fn inject(&self, bytes: &[u8]) {
        lock(&self.rx).extend_from_slice(bytes);
    }

    /// Take everything the peer has not yet read from this end's send line.
    pub fn take_sent(&self) -> Vec<u8> {
        let mut line = lock(&self.tx);
        let out = line.to_vec();
        line.clear();
        out
    }

    /// Number of bytes waiting to be received on this end.
    pub fn pending(&self) -> usize {
        lock(&self.rx).len()
    }
}

impl Transport for MemoryTransport {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut line = lock(&self.rx);
        let n = line.len().min(buf.len());
        buf[..n].copy_from_slice(&line[..n]);
        line.advance(n);
        Ok(n)
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let n = match self.send_budget {
            Some(budget) => data.len().min(budget),
            None => data.len(),
        };
        lock(&self.tx).extend_from_slice(&data[..n]);
        Ok(n)
    }
}

fn lock(line: &Line) -> MutexGuard<'_, BytesMut> {
    line.lock().unwrap_or_else(PoisonError::into_inner)
}
