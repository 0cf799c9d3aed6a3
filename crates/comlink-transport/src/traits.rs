use std::io::{ErrorKind, Read, Write};

use tracing::trace;

use crate::error::{Result, TransportError};

/// Non-blocking byte transport owned by one port.
///
/// Both calls must return immediately. `Ok(0)` is the normal answer when
/// nothing is pending (receive) or the driver cannot take more bytes right
/// now (send).
pub trait Transport {
    /// Copy up to `buf.len()` pending bytes into `buf`.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Offer `data` to the driver and return how many bytes it accepted.
    fn send(&mut self, data: &[u8]) -> Result<usize>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).receive(buf)
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        (**self).send(data)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).receive(buf)
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        (**self).send(data)
    }
}

/// Adapts any `Read + Write` stream to the non-blocking [`Transport`] contract.
///
/// `WouldBlock`, `TimedOut` and `Interrupted` are reported as zero bytes
/// moved. A read returning `Ok(0)` on a non-empty buffer is end of stream and
/// maps to [`TransportError::Closed`].
pub struct StreamTransport<T> {
    inner: T,
}

impl<T: Read + Write> StreamTransport<T> {
    /// Wrap a stream. Blocking streams should be configured with a short
    /// read timeout (or non-blocking mode) before being wrapped.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the transport and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write> Transport for StreamTransport<T> {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.inner.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => {
                trace!(bytes = n, "stream receive");
                Ok(n)
            }
            Err(err) if is_idle(err.kind()) => Ok(0),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        match self.inner.write(data) {
            Ok(n) => {
                trace!(bytes = n, "stream send");
                Ok(n)
            }
            Err(err) if is_idle(err.kind()) => Ok(0),
            Err(err) => Err(TransportError::Io(err)),
        }
    }
}

impl<T> std::fmt::Debug for StreamTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport").finish_non_exhaustive()
    }
}

fn is_idle(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}
