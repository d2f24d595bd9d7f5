//! Error types for nuncio.
//!
//! The taxonomy separates transport failures (which invalidate the
//! connection) from server-reported command errors (which do not). Timeouts
//! are split by the phase they occurred in, because recovery differs:
//! a connect or write timeout always drops the stream, while a read timeout
//! inside a scoped deadline is translated to a null reply by the caller.

use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

/// Result type alias for nuncio operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nuncio.
#[derive(Error, Debug)]
pub enum Error {
    /// The connection is unusable: unknown protocol byte, unexpected EOF,
    /// or a socket-level failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The connect deadline elapsed while opening the transport or driving
    /// the TLS handshake.
    #[error("timed out while connecting")]
    ConnectTimeout,

    /// The read deadline elapsed before a full reply was available.
    #[error("timed out while reading")]
    ReadTimeout,

    /// The write deadline elapsed before the request was fully sent.
    #[error("timed out while writing")]
    WriteTimeout,

    /// An error reported by the server in a `-` or `!` frame.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Invalid connection parameters (bad TLS material, TLS requested
    /// without the `tls` feature, and so on).
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if this error is a deadline expiry of any phase.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::ConnectTimeout | Error::ReadTimeout | Error::WriteTimeout
        )
    }

    /// Returns true if the stream must be closed before re-signaling.
    ///
    /// Command errors keep the stream open so that pipelines can keep
    /// draining replies. A read timeout at this level is unscoped and
    /// indicates framing desynchronization, so it drops the stream too.
    #[inline]
    pub fn drops_connection(&self) -> bool {
        matches!(
            self,
            Error::Connection(_)
                | Error::ConnectTimeout
                | Error::ReadTimeout
                | Error::WriteTimeout
        )
    }
}

/// Malformed wire data observed while decoding a frame.
///
/// Protocol errors mean the stream position can no longer be trusted, so
/// they fold into [`Error::Connection`] at the session boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Unknown RESP type marker byte.
    #[error("invalid type marker: {0:?}")]
    InvalidTypeMarker(u8),

    /// A textual payload was not valid UTF-8.
    #[error("invalid UTF-8 in frame")]
    InvalidUtf8,

    /// Invalid integer payload.
    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),

    /// Invalid double payload.
    #[error("invalid double: {0:?}")]
    InvalidDouble(String),

    /// Invalid boolean payload (neither `t` nor `f`).
    #[error("invalid boolean: {0:?}")]
    InvalidBoolean(String),

    /// Negative or unparsable aggregate length.
    #[error("invalid length header: {0:?}")]
    InvalidLength(String),

    /// A bulk payload was not followed by CRLF.
    #[error("missing CRLF terminator")]
    MissingCrlf,

    /// A verbatim string payload was missing its three-byte tag.
    #[error("malformed verbatim string")]
    MalformedVerbatim,

    /// An empty line where a type marker was expected.
    #[error("empty frame header")]
    EmptyHeader,
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Connection(e.to_string())
    }
}

impl From<ParseIntError> for ProtocolError {
    fn from(e: ParseIntError) -> Self {
        ProtocolError::InvalidInteger(e.to_string())
    }
}

impl From<ParseFloatError> for ProtocolError {
    fn from(e: ParseFloatError) -> Self {
        ProtocolError::InvalidDouble(e.to_string())
    }
}

/// An error reported by the server.
///
/// Carried as a first-class decoded value so that a pipeline can associate
/// each error with the slot of the command that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CommandError {
    /// First whitespace-delimited token of the server text, e.g.
    /// `WRONGTYPE` or `MOVED`.
    pub code: String,
    /// The full server-reported text, code included.
    pub message: String,
}

impl CommandError {
    /// Build a command error from the raw server text.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let code = message.split(' ').next().unwrap_or_default().to_string();
        Self { code, message }
    }

    /// Classify the error by its code prefix.
    pub fn kind(&self) -> CommandErrorKind {
        match self.code.as_str() {
            "WRONGPASS" | "NOAUTH" => CommandErrorKind::Authentication,
            "NOPERM" => CommandErrorKind::Permission,
            "MOVED" => CommandErrorKind::Moved,
            "ASK" => CommandErrorKind::Ask,
            "EXECABORT" => CommandErrorKind::ExecAborted,
            _ => CommandErrorKind::Generic,
        }
    }
}

/// Sub-classification of [`CommandError`] by server code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    /// `WRONGPASS`, `NOAUTH`
    Authentication,
    /// `NOPERM`
    Permission,
    /// `MOVED` cluster redirect
    Moved,
    /// `ASK` cluster redirect
    Ask,
    /// `EXECABORT` transaction failure
    ExecAborted,
    /// Anything else (`ERR`, `WRONGTYPE`, ...)
    Generic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_code_split() {
        let err =
            CommandError::new("WRONGTYPE Operation against a key holding the wrong kind of value");
        assert_eq!(err.code, "WRONGTYPE");
        assert_eq!(
            err.to_string(),
            "WRONGTYPE Operation against a key holding the wrong kind of value"
        );
    }

    #[test]
    fn test_command_error_without_message() {
        let err = CommandError::new("EXECABORT");
        assert_eq!(err.code, "EXECABORT");
        assert_eq!(err.kind(), CommandErrorKind::ExecAborted);
    }

    #[test]
    fn test_command_error_kinds() {
        assert_eq!(
            CommandError::new("WRONGPASS invalid username-password pair").kind(),
            CommandErrorKind::Authentication
        );
        assert_eq!(
            CommandError::new("NOPERM this user has no permissions").kind(),
            CommandErrorKind::Permission
        );
        assert_eq!(
            CommandError::new("MOVED 3999 127.0.0.1:6381").kind(),
            CommandErrorKind::Moved
        );
        assert_eq!(
            CommandError::new("ERR unknown command 'FOO'").kind(),
            CommandErrorKind::Generic
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::ReadTimeout.is_timeout());
        assert!(Error::ReadTimeout.drops_connection());
        assert!(Error::Connection("eof".into()).drops_connection());
        assert!(!Error::Command(CommandError::new("ERR nope")).drops_connection());
        assert!(!Error::Config("bad".into()).drops_connection());
    }

    #[test]
    fn test_protocol_error_folds_into_connection() {
        let err: Error = ProtocolError::InvalidTypeMarker(b'&').into();
        assert!(matches!(err, Error::Connection(_)));
        assert!(err.drops_connection());
    }
}
