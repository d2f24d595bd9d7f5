//! # Nuncio
//!
//! A synchronous, memory-safe RESP3 client for Redis-compatible servers.
//!
//! Nuncio speaks the full RESP3 wire protocol and hides framing,
//! single-connection multiplexing, and session setup behind a small
//! request/response surface:
//!
//! - All RESP3 value kinds, streaming aggregates and attributes included
//! - Pipelining with slot-accurate error association
//! - MULTI/EXEC transactions with optimistic concurrency via WATCH
//! - Cursor scans as lazy iterators
//! - Pub/sub with explicit stream-ownership handoff
//! - TCP, Unix-domain socket, and TLS transports (rustls)
//!
//! ## Example
//!
//! ```no_run
//! use nuncio::{Config, Session};
//!
//! fn main() -> nuncio::Result<()> {
//!     let mut session = Session::new(Config::new().host("localhost"));
//!     session.call(&["SET", "greeting", "hello"])?;
//!     let reply = session.call(&["GET", "greeting"])?;
//!     assert_eq!(reply.as_str(), Some("hello"));
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! A [`Session`] is one logical caller at a time: every operation takes
//! `&mut self`. Share sessions through a pool or a mutex, not internally.

#![doc(html_root_url = "https://docs.rs/nuncio/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_lifetimes,
    unused_qualifications
)]

// ─────────────────────────────────────────────────────────────────────────────
// Modules
// ─────────────────────────────────────────────────────────────────────────────

/// Connection parameters.
pub mod config;
/// Error types and result aliases.
pub mod error;
/// RESP3 encoding and decoding.
pub mod protocol;
/// Session, pipelines, transactions, scans, and pub/sub.
pub mod session;
/// Buffered framing over a transport.
pub mod stream;
/// TCP, Unix-socket, and TLS byte transports.
pub mod transport;

/// TLS client configuration (optional).
#[cfg(feature = "tls")]
mod tls;

// ─────────────────────────────────────────────────────────────────────────────
// Common Re-exports
// ─────────────────────────────────────────────────────────────────────────────

// Error handling
pub use error::{CommandError, CommandErrorKind, Error, ProtocolError, Result};

// Configuration
pub use config::{Config, TlsParams};

// Protocol
pub use protocol::Value;

// Session
pub use session::{Pipeline, PubSub, ScanIter, Session, Transaction};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Crate version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default server port.
pub const DEFAULT_PORT: u16 = 6379;

/// Default username for the handshake AUTH clause.
pub const DEFAULT_USERNAME: &str = "default";

/// Unified default for the connect, read, and write deadlines.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(3);

/// Initial read-buffer capacity, sized to the typical protocol frame.
pub const READ_BUFFER_SIZE: usize = 8 * 1024;
