//! Raw byte transports: TCP, Unix-domain sockets, and TLS.
//!
//! A [`Transport`] is a full-duplex blocking byte stream with per-operation
//! deadlines delegated to the socket layer. Interrupted syscalls are retried
//! transparently; deadline expiries surface as the timeout error of the
//! operation's phase.

use crate::config::Config;
use crate::error::{Error, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::debug;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

#[cfg(feature = "tls")]
use rustls::{ClientConnection, StreamOwned};

/// Socket timeouts reject a zero duration; a zero deadline means
/// "do not wait past available data", so it is clamped to the minimum.
const POLL_DEADLINE: Duration = Duration::from_millis(1);

/// A connected byte stream.
pub enum Transport {
    /// Plain TCP
    Tcp(TcpStream),
    /// Unix-domain socket
    #[cfg(unix)]
    Unix(UnixStream),
    /// TLS over TCP
    #[cfg(feature = "tls")]
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Transport {
    /// Open a transport according to the configuration.
    ///
    /// The connect deadline covers address connection and, when TLS is
    /// enabled, every wait of the handshake loop.
    pub fn connect(config: &Config) -> Result<Self> {
        #[cfg(unix)]
        if let Some(path) = &config.path {
            let sock = UnixStream::connect(path)
                .map_err(|e| Error::Connection(format!("{}: {e}", path.display())))?;
            debug!("connected to unix socket {}", path.display());
            return Ok(Transport::Unix(sock));
        }
        #[cfg(not(unix))]
        if config.path.is_some() {
            return Err(Error::Config(
                "unix sockets are not supported on this platform".into(),
            ));
        }

        let deadline = config.connect_timeout.map(|t| Instant::now() + t);
        let sock = connect_tcp(config, deadline)?;
        // Pipelines and transactions suffer an extra round trip under Nagle.
        sock.set_nodelay(true)
            .map_err(|e| Error::Connection(e.to_string()))?;
        debug!("connected to {}", config.addr());

        if config.ssl {
            #[cfg(feature = "tls")]
            {
                let tls = crate::tls::handshake(sock, config, deadline)?;
                return Ok(Transport::Tls(Box::new(tls)));
            }
            #[cfg(not(feature = "tls"))]
            return Err(Error::Config(
                "ssl requested but nuncio was built without the `tls` feature".into(),
            ));
        }

        Ok(Transport::Tcp(sock))
    }

    /// Read into `buf`, returning the number of bytes read (0 on EOF).
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let result = match self {
                Transport::Tcp(s) => s.read(buf),
                #[cfg(unix)]
                Transport::Unix(s) => s.read(buf),
                #[cfg(feature = "tls")]
                Transport::Tls(s) => s.read(buf),
            };
            match result {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_deadline(&e) => return Err(Error::ReadTimeout),
                Err(e) => return Err(Error::Connection(e.to_string())),
            }
        }
    }

    /// Write all of `buf` within the write deadline.
    pub fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let result = match self {
                Transport::Tcp(s) => s.write(buf),
                #[cfg(unix)]
                Transport::Unix(s) => s.write(buf),
                #[cfg(feature = "tls")]
                Transport::Tls(s) => s.write(buf),
            };
            match result {
                Ok(0) => return Err(Error::Connection("socket closed while writing".into())),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_deadline(&e) => return Err(Error::WriteTimeout),
                Err(e) => return Err(Error::Connection(e.to_string())),
            }
        }
        Ok(())
    }

    /// Install the read deadline for subsequent reads.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let timeout = clamp_deadline(timeout);
        let result = match self {
            Transport::Tcp(s) => s.set_read_timeout(timeout),
            #[cfg(unix)]
            Transport::Unix(s) => s.set_read_timeout(timeout),
            #[cfg(feature = "tls")]
            Transport::Tls(s) => s.sock.set_read_timeout(timeout),
        };
        result.map_err(|e| Error::Connection(e.to_string()))
    }

    /// Install the write deadline for subsequent writes.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let timeout = clamp_deadline(timeout);
        let result = match self {
            Transport::Tcp(s) => s.set_write_timeout(timeout),
            #[cfg(unix)]
            Transport::Unix(s) => s.set_write_timeout(timeout),
            #[cfg(feature = "tls")]
            Transport::Tls(s) => s.sock.set_write_timeout(timeout),
        };
        result.map_err(|e| Error::Connection(e.to_string()))
    }
}

/// Connect over TCP, trying every resolved address under the deadline.
fn connect_tcp(config: &Config, deadline: Option<Instant>) -> Result<TcpStream> {
    let addrs = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| Error::Connection(format!("{}: {e}", config.addr())))?;

    let mut last_err = None;
    for addr in addrs {
        let attempt = match remaining(deadline)? {
            Some(t) => TcpStream::connect_timeout(&addr, t),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(sock) => return Ok(sock),
            Err(e) if e.kind() == ErrorKind::TimedOut => return Err(Error::ConnectTimeout),
            Err(e) => last_err = Some(e),
        }
    }

    Err(match last_err {
        Some(e) => Error::Connection(format!("{}: {e}", config.addr())),
        None => Error::Connection(format!("{}: no addresses resolved", config.addr())),
    })
}

/// Time left until `deadline`, or `ConnectTimeout` when it has passed.
pub(crate) fn remaining(deadline: Option<Instant>) -> Result<Option<Duration>> {
    match deadline {
        None => Ok(None),
        Some(d) => {
            let now = Instant::now();
            if now >= d {
                Err(Error::ConnectTimeout)
            } else {
                Ok(Some(d - now))
            }
        }
    }
}

/// Map a zero deadline to the smallest one the socket layer accepts.
pub(crate) fn clamp_deadline(timeout: Option<Duration>) -> Option<Duration> {
    match timeout {
        Some(t) if t.is_zero() => Some(POLL_DEADLINE),
        other => other,
    }
}

/// Both Unix (`WouldBlock`) and Windows (`TimedOut`) signal an expired
/// socket deadline.
pub(crate) fn is_deadline(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_none_is_unbounded() {
        assert!(matches!(remaining(None), Ok(None)));
    }

    #[test]
    fn test_remaining_expired_deadline() {
        let past = Instant::now() - Duration::from_millis(10);
        assert!(matches!(remaining(Some(past)), Err(Error::ConnectTimeout)));
    }

    #[test]
    fn test_clamp_zero_deadline() {
        assert_eq!(clamp_deadline(Some(Duration::ZERO)), Some(POLL_DEADLINE));
        assert_eq!(clamp_deadline(None), None);
        let t = Some(Duration::from_secs(1));
        assert_eq!(clamp_deadline(t), t);
    }

    #[test]
    fn test_connect_refused_is_connection_error() {
        // Port 1 on localhost is almost certainly closed.
        let config = Config::new()
            .host("127.0.0.1")
            .port(1)
            .timeout(Some(Duration::from_millis(200)));
        match Transport::connect(&config) {
            Err(Error::Connection(_)) | Err(Error::ConnectTimeout) => {}
            Err(other) => panic!("expected connection failure, got {other}"),
            Ok(_) => panic!("expected connection failure, got a transport"),
        }
    }
}
