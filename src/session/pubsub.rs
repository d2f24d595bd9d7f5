//! Publish/subscribe mode.

use crate::error::{Error, Result};
use crate::protocol::{decode, encode_command, Value};
use crate::stream::BufferedStream;
use bytes::BytesMut;
use std::time::Duration;

/// A subscription handle owning the stream it was handed.
///
/// In pub/sub mode the half-duplex discipline inverts: writes are
/// fire-and-forget and the stream becomes a server-driven event source.
/// The handle owns the stream outright; the session it came from cannot
/// touch it again.
pub struct PubSub {
    stream: BufferedStream,
}

impl PubSub {
    pub(crate) fn new(stream: BufferedStream) -> Self {
        Self { stream }
    }

    /// Send a command without decoding a reply.
    ///
    /// Confirmations (`subscribe`, `unsubscribe`, ...) arrive as events.
    pub fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<()> {
        let mut buf = BytesMut::new();
        encode_command(&mut buf, args);
        self.stream.write(&buf);
        self.stream.flush()
    }

    /// Wait for the next server event.
    ///
    /// `None` blocks indefinitely. A deadline expiry returns `Ok(None)` and
    /// leaves the stream open; a pending event is still delivered by a
    /// later wait.
    pub fn next_event(&mut self, timeout: Option<Duration>) -> Result<Option<Value>> {
        match self.stream.with_timeout(timeout, |s| decode(s)) {
            Ok(value) => Ok(Some(value)),
            Err(Error::ReadTimeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
