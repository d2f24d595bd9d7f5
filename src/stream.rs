//! Buffered, framing-aware byte stream over a [`Transport`].
//!
//! Reads are line- and count-bounded, each limited by the read deadline.
//! Writes coalesce into an outgoing buffer until [`BufferedStream::flush`].
//! Deadlines are per-operation, not cumulative, and can be overridden for a
//! scope with [`BufferedStream::with_timeout`].

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::READ_BUFFER_SIZE;
use bytes::{Buf, Bytes, BytesMut};
use memchr::memchr;
use std::time::Duration;
use tracing::trace;

/// A transport wrapped with read/write buffers and deadline bookkeeping.
pub struct BufferedStream {
    transport: Transport,
    rbuf: BytesMut,
    wbuf: BytesMut,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl BufferedStream {
    /// Wrap a connected transport, installing the configured deadlines.
    pub fn new(transport: Transport, config: &Config) -> Result<Self> {
        let mut stream = Self {
            transport,
            rbuf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            wbuf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        };
        stream.transport.set_read_timeout(stream.read_timeout)?;
        stream.transport.set_write_timeout(stream.write_timeout)?;
        Ok(stream)
    }

    /// Append bytes to the outgoing buffer.
    ///
    /// Nothing reaches the transport until [`flush`](Self::flush), so several
    /// commands can be coalesced into one write.
    pub fn write(&mut self, bytes: &[u8]) {
        self.wbuf.extend_from_slice(bytes);
    }

    /// Force pending bytes to the transport within the write deadline.
    pub fn flush(&mut self) -> Result<()> {
        if self.wbuf.is_empty() {
            return Ok(());
        }
        let pending = self.wbuf.split();
        self.transport.write_all(&pending)?;
        trace!("flushed {} bytes", pending.len());
        Ok(())
    }

    /// Read bytes up to and excluding the next CRLF; the CRLF is consumed.
    pub fn read_line(&mut self) -> Result<Bytes> {
        loop {
            if let Some(pos) = find_crlf(&self.rbuf) {
                let line = self.rbuf.split_to(pos).freeze();
                self.rbuf.advance(2);
                return Ok(line);
            }
            self.fill()?;
        }
    }

    /// Read exactly `n` bytes.
    ///
    /// A trailing CRLF is not consumed; callers expecting one read it
    /// separately.
    pub fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        while self.rbuf.len() < n {
            self.fill()?;
        }
        Ok(self.rbuf.split_to(n).freeze())
    }

    /// Run `f` with the read and write deadlines overridden.
    ///
    /// The previous deadlines are restored on every exit path, failure
    /// included. `None` blocks indefinitely; a zero duration does not wait
    /// past already-available data.
    pub fn with_timeout<R>(
        &mut self,
        timeout: Option<Duration>,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let prev = (self.read_timeout, self.write_timeout);
        self.set_deadlines(timeout, timeout)?;
        let out = f(self);
        if let Err(e) = self.set_deadlines(prev.0, prev.1) {
            // A failed restore means the socket itself is gone; the scope's
            // own error, if any, is the more useful one to surface.
            if out.is_ok() {
                return Err(e);
            }
        }
        out
    }

    fn set_deadlines(&mut self, read: Option<Duration>, write: Option<Duration>) -> Result<()> {
        self.transport.set_read_timeout(read)?;
        self.transport.set_write_timeout(write)?;
        self.read_timeout = read;
        self.write_timeout = write;
        Ok(())
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_BUFFER_SIZE];
        let n = self.transport.read(&mut chunk)?;
        if n == 0 {
            return Err(Error::Connection("unexpected EOF".into()));
        }
        trace!("read {} bytes", n);
        self.rbuf.extend_from_slice(&chunk[..n]);
        Ok(())
    }
}

/// Find CRLF in a byte slice.
///
/// memchr scans for `\r`, then the following byte is checked for `\n`.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    let mut offset = 0;
    while offset + 1 < buf.len() {
        match memchr(b'\r', &buf[offset..]) {
            Some(pos) => {
                let abs = offset + pos;
                if abs + 1 < buf.len() && buf[abs + 1] == b'\n' {
                    return Some(abs);
                }
                offset = abs + 1;
            }
            None => return None,
        }
    }
    None
}
