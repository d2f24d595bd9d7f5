//! Pipeline and transaction builders.

use crate::error::{Error, Result};
use crate::protocol::{decode, encode_command, Value};
use crate::stream::BufferedStream;
use bytes::BytesMut;
use std::time::Duration;

/// How a slot's reply is read back.
enum ReadMode {
    /// Under the session's deadline.
    Default,
    /// Under a scoped deadline; expiry yields a null slot.
    Scoped(Option<Duration>),
}

/// Accumulates encoded commands for a single batched write.
///
/// Commands encode directly into one buffer, so dispatch is a single write
/// followed by one reply decode per queued command, in order.
pub struct Pipeline {
    buf: BytesMut,
    slots: Vec<ReadMode>,
}

impl Pipeline {
    pub(crate) fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            slots: Vec::new(),
        }
    }

    /// Queue one command.
    pub fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) {
        encode_command(&mut self.buf, args);
        self.slots.push(ReadMode::Default);
    }

    /// Queue one command whose reply is read under a scoped deadline.
    ///
    /// Expiry leaves [`Value::Null`] in the slot instead of failing the
    /// whole batch.
    pub fn blocking_call<A: AsRef<[u8]>>(&mut self, timeout: Option<Duration>, args: &[A]) {
        encode_command(&mut self.buf, args);
        self.slots.push(ReadMode::Scoped(timeout));
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no commands are queued.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Write the whole batch, then decode exactly one reply per slot.
    ///
    /// Server errors land in their slot as values; the caller decides
    /// which, if any, to surface once every reply is drained.
    pub(crate) fn dispatch(&self, stream: &mut BufferedStream) -> Result<Vec<Value>> {
        stream.write(&self.buf);
        stream.flush()?;

        let mut replies = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let reply = match slot {
                ReadMode::Default => decode(stream)?,
                ReadMode::Scoped(timeout) => {
                    match stream.with_timeout(*timeout, |s| decode(s)) {
                        Err(Error::ReadTimeout) => Value::Null,
                        other => other?,
                    }
                }
            };
            replies.push(reply);
        }
        Ok(replies)
    }
}

/// A pipeline bracketed by `MULTI` and `EXEC`.
pub struct Transaction {
    inner: Pipeline,
}

impl Transaction {
    pub(crate) fn new() -> Self {
        let mut inner = Pipeline::new();
        inner.call(&[&b"MULTI"[..]]);
        Self { inner }
    }

    /// Queue one command inside the transaction block.
    pub fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) {
        self.inner.call(args);
    }

    /// Number of queued commands, MULTI excluded.
    pub fn len(&self) -> usize {
        self.inner.len() - 1
    }

    /// Whether no commands were queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn finish(mut self) -> Pipeline {
        self.inner.call(&[&b"EXEC"[..]]);
        self.inner
    }
}
