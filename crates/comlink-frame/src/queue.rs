use bytes::{Buf, BytesMut};
use comlink_transport::Transport;
use tracing::trace;

use crate::error::{FrameError, Result};

/// Default transmit queue capacity in bytes.
pub const DEFAULT_TX_BUFFER_SIZE: usize = 1024;

/// Bounded FIFO of encoded frames waiting for the transport.
///
/// Frames are pushed whole or not at all, so a frame's bytes are always
/// contiguous and a rejected push leaves queued frames untouched.
#[derive(Debug)]
pub struct TxQueue {
    buf: BytesMut,
    capacity: usize,
}

impl TxQueue {
    /// Create a queue with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TX_BUFFER_SIZE)
    }

    /// Create a queue holding at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one encoded frame.
    ///
    /// Fails with [`FrameError::QueueFull`] when the frame does not fit.
    pub fn push_frame(&mut self, frame: &[u8]) -> Result<()> {
        let available = self.available();
        if frame.len() > available {
            return Err(FrameError::QueueFull {
                needed: frame.len(),
                available,
            });
        }
        self.buf.extend_from_slice(frame);
        Ok(())
    }

    /// Write as many queued bytes as the transport accepts right now.
    ///
    /// Returns the number of bytes written.
    pub fn drain<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<usize> {
        let mut written = 0usize;
        while !self.buf.is_empty() {
            let n = transport.send(&self.buf)?;
            if n == 0 {
                break;
            }
            self.buf.advance(n);
            written += n;
        }
        if written > 0 {
            trace!(written, remaining = self.buf.len(), "drained transmit queue");
        }
        Ok(written)
    }

    /// Bytes waiting to be sent.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Free space in bytes.
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.buf.len())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard everything queued.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for TxQueue {
    fn default() -> Self {
        Self::new()
    }
}
