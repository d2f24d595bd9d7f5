//! The session layer.
//!
//! A [`Session`] owns at most one live stream and multiplexes it across
//! sequential commands: handshake on first use, single-call dispatch,
//! pipelines, MULTI/EXEC transactions, cursor scans, and the pub/sub
//! handoff. Any transport-level failure drops the stream; the next
//! operation reopens and re-handshakes on a fresh transport.

mod pipeline;
mod pubsub;
mod scan;

pub use pipeline::{Pipeline, Transaction};
pub use pubsub::PubSub;
pub use scan::ScanIter;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::{decode, encode_command, Value};
use crate::stream::BufferedStream;
use crate::transport::Transport;
use bytes::BytesMut;
use std::time::Duration;
use tracing::debug;

/// A synchronous client session.
///
/// One logical caller at a time: every operation takes `&mut self`, so the
/// borrow checker enforces that two commands never interleave their writes
/// or reads on the same stream. External sharing (a pool, a mutex) is the
/// caller's concern.
pub struct Session {
    config: Config,
    stream: Option<BufferedStream>,
}

impl Session {
    /// Create a session; the connection is opened lazily on first use.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    /// The session's connection parameters.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a live stream is currently held.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Close the connection. The next operation reopens and re-handshakes.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("session closed");
        }
    }

    /// Issue one command and decode one reply.
    ///
    /// A server-reported error raises [`Error::Command`], typed by its code
    /// prefix, and leaves the stream open.
    pub fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<Value> {
        let result = self.stream().and_then(|stream| exchange(stream, args));
        raise(self.guard(result)?)
    }

    /// Like [`call`](Self::call), with the reply read under a scoped
    /// deadline.
    ///
    /// Meant for commands that block server-side (`BRPOP`, `BLPOP`, ...):
    /// a read-timeout means "no data yet" and is translated to
    /// [`Value::Null`] without closing the stream.
    pub fn blocking_call<A: AsRef<[u8]>>(
        &mut self,
        timeout: Option<Duration>,
        args: &[A],
    ) -> Result<Value> {
        let result = self.stream().and_then(|stream| {
            send(stream, args)?;
            match stream.with_timeout(timeout, |s| decode(s)) {
                Err(Error::ReadTimeout) => Ok(Value::Null),
                other => other,
            }
        });
        raise(self.guard(result)?)
    }

    /// Batch several commands into one write and decode their replies in
    /// order.
    ///
    /// Every slot is decoded before any error is surfaced; the
    /// lowest-indexed server error is then raised. The results are returned
    /// only when no slot holds an error.
    pub fn pipelined<F>(&mut self, f: F) -> Result<Vec<Value>>
    where
        F: FnOnce(&mut Pipeline) -> Result<()>,
    {
        let mut pipeline = Pipeline::new();
        f(&mut pipeline)?;
        let result = self.stream().and_then(|stream| pipeline.dispatch(stream));
        let replies = self.guard(result)?;
        raise_first(&replies)?;
        Ok(replies)
    }

    /// Run a MULTI/EXEC transaction, optionally guarded by `WATCH`.
    ///
    /// Returns the EXEC reply: the queued commands' results on commit,
    /// [`Value::Null`] when a watched key changed. If the builder closure
    /// fails before dispatch, any watch is released with `UNWATCH` and the
    /// failure re-signaled.
    pub fn multi<K, F>(&mut self, watch: &[K], f: F) -> Result<Value>
    where
        K: AsRef<[u8]>,
        F: FnOnce(&mut Transaction) -> Result<()>,
    {
        if !watch.is_empty() {
            let mut args: Vec<&[u8]> = Vec::with_capacity(watch.len() + 1);
            args.push(b"WATCH");
            args.extend(watch.iter().map(|k| k.as_ref()));
            self.call(&args)?;
        }

        let mut tx = Transaction::new();
        if let Err(e) = f(&mut tx) {
            if !watch.is_empty() {
                // The builder's own failure is the one worth surfacing.
                let _ = self.call(&[&b"UNWATCH"[..]]);
            }
            return Err(e);
        }

        let pipeline = tx.finish();
        let result = self.stream().and_then(|stream| pipeline.dispatch(stream));
        let mut replies = self.guard(result)?;
        raise_first(&replies)?;
        Ok(replies.pop().unwrap_or(Value::Null))
    }

    /// Iterate a server-side collection with a cursor scan, e.g.
    /// `session.scan("SCAN", &["MATCH", "user:*"])`.
    pub fn scan<A: AsRef<[u8]>>(
        &mut self,
        verb: impl AsRef<[u8]>,
        args: &[A],
    ) -> ScanIter<'_> {
        ScanIter::new(self, vec![verb.as_ref().to_vec()], owned(args))
    }

    /// Cursor scan bound to a key, e.g.
    /// `session.scan_key("HSCAN", "myhash", &["COUNT", "100"])`.
    pub fn scan_key<A: AsRef<[u8]>>(
        &mut self,
        verb: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
        args: &[A],
    ) -> ScanIter<'_> {
        ScanIter::new(
            self,
            vec![verb.as_ref().to_vec(), key.as_ref().to_vec()],
            owned(args),
        )
    }

    /// Convert the session into a pub/sub handle.
    ///
    /// Ownership of the stream moves into the handle; the session reverts
    /// to the unconnected state and opens a fresh transport on next use.
    pub fn pubsub(&mut self) -> Result<PubSub> {
        self.stream()?;
        match self.stream.take() {
            Some(stream) => {
                debug!("stream handed off to pub/sub");
                Ok(PubSub::new(stream))
            }
            None => Err(Error::Connection("no live stream to hand off".into())),
        }
    }

    /// The live stream, opened and handshaken lazily.
    fn stream(&mut self) -> Result<&mut BufferedStream> {
        if self.stream.is_none() {
            self.stream = Some(self.open()?);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| Error::Connection("stream unavailable".into()))
    }

    fn open(&self) -> Result<BufferedStream> {
        let transport = Transport::connect(&self.config)?;
        let mut stream = BufferedStream::new(transport, &self.config)?;
        self.handshake(&mut stream)?;
        Ok(stream)
    }

    /// Version negotiation and authentication: `HELLO 3`, with an AUTH
    /// clause when a password is configured, then `SELECT` for a configured
    /// database index.
    fn handshake(&self, stream: &mut BufferedStream) -> Result<()> {
        let mut hello: Vec<&[u8]> = vec![&b"HELLO"[..], &b"3"[..]];
        if let Some(password) = &self.config.password {
            hello.push(b"AUTH");
            hello.push(self.config.username.as_bytes());
            hello.push(password.as_bytes());
        }
        raise(exchange(stream, &hello)?)?;

        if let Some(db) = self.config.db {
            let db = db.to_string();
            raise(exchange(stream, &[&b"SELECT"[..], db.as_bytes()])?)?;
        }

        debug!("handshake complete");
        Ok(())
    }

    /// Drop the stream before re-signaling transport-level failures.
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.drops_connection() {
                debug!("connection faulted: {e}");
                self.stream = None;
            }
        }
        result
    }
}

fn send<A: AsRef<[u8]>>(stream: &mut BufferedStream, args: &[A]) -> Result<()> {
    let mut buf = BytesMut::new();
    encode_command(&mut buf, args);
    stream.write(&buf);
    stream.flush()
}

fn exchange<A: AsRef<[u8]>>(stream: &mut BufferedStream, args: &[A]) -> Result<Value> {
    send(stream, args)?;
    decode(stream)
}

/// Surface a server-reported error reply as [`Error::Command`].
fn raise(reply: Value) -> Result<Value> {
    match reply.as_error() {
        Some(err) => Err(Error::Command(err.clone())),
        None => Ok(reply),
    }
}

/// Surface the lowest-indexed error in a batch of replies.
fn raise_first(replies: &[Value]) -> Result<()> {
    match replies.iter().find_map(Value::as_error) {
        Some(err) => Err(Error::Command(err.clone())),
        None => Ok(()),
    }
}

fn owned<A: AsRef<[u8]>>(args: &[A]) -> Vec<Vec<u8>> {
    args.iter().map(|a| a.as_ref().to_vec()).collect()
}
