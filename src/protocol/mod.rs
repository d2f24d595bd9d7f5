//! RESP3 protocol implementation.
//!
//! Commands are encoded as arrays of bulk strings; replies decode into the
//! typed [`Value`] union, including the streaming aggregate forms and
//! attribute-annotated values.

mod decode;
mod encode;
mod value;

pub use decode::{decode, ReadFrame};
pub use encode::encode_command;
pub use value::Value;

/// CRLF terminator bytes.
pub const CRLF: &[u8] = b"\r\n";

/// Type markers for RESP3.
pub mod markers {
    /// Simple string: +
    pub const SIMPLE_STRING: u8 = b'+';
    /// Error: -
    pub const ERROR: u8 = b'-';
    /// Integer: :
    pub const INTEGER: u8 = b':';
    /// Bulk string: $
    pub const BULK_STRING: u8 = b'$';
    /// Array: *
    pub const ARRAY: u8 = b'*';
    /// Null: _
    pub const NULL: u8 = b'_';
    /// Boolean: #
    pub const BOOLEAN: u8 = b'#';
    /// Double: ,
    pub const DOUBLE: u8 = b',';
    /// Big number: (
    pub const BIG_NUMBER: u8 = b'(';
    /// Blob error: !
    pub const BLOB_ERROR: u8 = b'!';
    /// Verbatim string: =
    pub const VERBATIM_STRING: u8 = b'=';
    /// Map: %
    pub const MAP: u8 = b'%';
    /// Set: ~
    pub const SET: u8 = b'~';
    /// Attribute: |
    pub const ATTRIBUTE: u8 = b'|';
    /// Push: >
    pub const PUSH: u8 = b'>';
    /// Streamed aggregate terminator: .
    pub const STREAM_END: u8 = b'.';
    /// Streamed bulk chunk: ;
    pub const CHUNK: u8 = b';';
}
