//! Reply decoding.
//!
//! The decoder pulls one line to obtain the type marker and header payload,
//! then dispatches on the marker. Aggregates recurse; streaming aggregates
//! (`$?`, `*?`, `~?`, `%?`) are concatenated into a single logical value of
//! the same kind. Attribute frames wrap the value that follows them.
//!
//! Server errors (`-` and `!`) decode into [`Value::Error`] and are returned,
//! not raised; the session decides when to surface them.

use super::markers;
use super::value::Value;
use crate::error::{CommandError, ProtocolError, Result};
use bytes::{Bytes, BytesMut};

/// A source of framed bytes the decoder can pull from.
///
/// Implemented by [`crate::stream::BufferedStream`]; tests implement it over
/// in-memory slices.
pub trait ReadFrame {
    /// Bytes up to and excluding the next CRLF; the CRLF is consumed.
    fn read_line(&mut self) -> Result<Bytes>;
    /// Exactly `n` bytes, trailing CRLF not consumed.
    fn read_exact(&mut self, n: usize) -> Result<Bytes>;
}

impl ReadFrame for crate::stream::BufferedStream {
    fn read_line(&mut self) -> Result<Bytes> {
        // Resolves to the inherent method.
        crate::stream::BufferedStream::read_line(self)
    }

    fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        crate::stream::BufferedStream::read_exact(self, n)
    }
}

/// Decode one top-level value, consuming exactly one frame (plus any
/// preceding attribute frames).
pub fn decode<S: ReadFrame>(src: &mut S) -> Result<Value> {
    let header = src.read_line()?;
    decode_frame(&header, src)
}

fn decode_frame<S: ReadFrame>(header: &[u8], src: &mut S) -> Result<Value> {
    let (&marker, body) = header.split_first().ok_or(ProtocolError::EmptyHeader)?;

    match marker {
        markers::SIMPLE_STRING => Ok(Value::Simple(utf8(body)?.to_string())),
        markers::ERROR => Ok(Value::Error(CommandError::new(utf8(body)?))),
        markers::INTEGER => Ok(Value::Integer(parse_integer(body)?)),
        markers::BULK_STRING => decode_bulk(body, src),
        markers::ARRAY => match parse_length(body)? {
            Length::Null => Ok(Value::Null),
            Length::Exact(n) => Ok(Value::Array(decode_elements(src, n)?)),
            Length::Streamed => Ok(Value::Array(decode_elements_streamed(src)?)),
        },
        markers::NULL => Ok(Value::Null),
        markers::DOUBLE => Ok(Value::Double(parse_double(body)?)),
        markers::BOOLEAN => match body {
            b"t" => Ok(Value::Boolean(true)),
            b"f" => Ok(Value::Boolean(false)),
            _ => Err(ProtocolError::InvalidBoolean(lossy(body)).into()),
        },
        markers::BLOB_ERROR => decode_blob_error(body, src),
        markers::VERBATIM_STRING => decode_verbatim(body, src),
        markers::BIG_NUMBER => Ok(Value::BigNumber(parse_big_number(body)?)),
        markers::MAP => match parse_length(body)? {
            Length::Null => Ok(Value::Null),
            Length::Exact(n) => Ok(Value::Map(decode_pairs(src, n)?)),
            Length::Streamed => Ok(Value::Map(decode_pairs_streamed(src)?)),
        },
        markers::SET => match parse_length(body)? {
            Length::Null => Ok(Value::Null),
            Length::Exact(n) => Ok(Value::Set(decode_elements(src, n)?)),
            Length::Streamed => Ok(Value::Set(decode_elements_streamed(src)?)),
        },
        markers::ATTRIBUTE => {
            let n = match parse_length(body)? {
                Length::Exact(n) => n,
                _ => return Err(ProtocolError::InvalidLength(lossy(body)).into()),
            };
            let attrs = decode_pairs(src, n)?;
            let value = decode(src)?;
            Ok(Value::Attributed {
                attrs,
                value: Box::new(value),
            })
        }
        markers::PUSH => match parse_length(body)? {
            Length::Exact(n) => Ok(Value::Push(decode_elements(src, n)?)),
            _ => Err(ProtocolError::InvalidLength(lossy(body)).into()),
        },
        other => Err(ProtocolError::InvalidTypeMarker(other).into()),
    }
}

/// An aggregate length header: `-1`, a count, or `?` for streaming.
enum Length {
    Null,
    Exact(usize),
    Streamed,
}

fn parse_length(body: &[u8]) -> Result<Length> {
    if body == b"?" {
        return Ok(Length::Streamed);
    }
    let n = parse_integer(body)?;
    if n < 0 {
        Ok(Length::Null)
    } else {
        Ok(Length::Exact(n as usize))
    }
}

fn decode_bulk<S: ReadFrame>(body: &[u8], src: &mut S) -> Result<Value> {
    match parse_length(body)? {
        Length::Null => Ok(Value::Null),
        Length::Exact(n) => Ok(Value::Bulk(read_payload(src, n)?)),
        Length::Streamed => Ok(Value::Bulk(read_chunks(src)?)),
    }
}

fn decode_blob_error<S: ReadFrame>(body: &[u8], src: &mut S) -> Result<Value> {
    match parse_length(body)? {
        Length::Null => Ok(Value::Null),
        Length::Exact(n) => {
            let payload = read_payload(src, n)?;
            Ok(Value::Error(CommandError::new(utf8(&payload)?)))
        }
        Length::Streamed => Err(ProtocolError::InvalidLength(lossy(body)).into()),
    }
}

fn decode_verbatim<S: ReadFrame>(body: &[u8], src: &mut S) -> Result<Value> {
    match parse_length(body)? {
        Length::Null => Ok(Value::Null),
        Length::Exact(n) => {
            let payload = read_payload(src, n)?;
            // Three-byte content-type tag, a colon, then the data.
            if payload.len() < 4 || payload[3] != b':' {
                return Err(ProtocolError::MalformedVerbatim.into());
            }
            let format = utf8(&payload[..3])?.to_string();
            let data = payload.slice(4..);
            Ok(Value::Verbatim { format, data })
        }
        Length::Streamed => Err(ProtocolError::InvalidLength(lossy(body)).into()),
    }
}

fn decode_elements<S: ReadFrame>(src: &mut S, n: usize) -> Result<Vec<Value>> {
    let mut items = Vec::with_capacity(n.min(1024));
    for _ in 0..n {
        items.push(decode(src)?);
    }
    Ok(items)
}

fn decode_elements_streamed<S: ReadFrame>(src: &mut S) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    loop {
        let header = src.read_line()?;
        if is_stream_end(&header) {
            return Ok(items);
        }
        items.push(decode_frame(&header, src)?);
    }
}

fn decode_pairs<S: ReadFrame>(src: &mut S, n: usize) -> Result<Vec<(Value, Value)>> {
    let mut pairs = Vec::with_capacity(n.min(1024));
    for _ in 0..n {
        let key = decode(src)?;
        let value = decode(src)?;
        pairs.push((key, value));
    }
    Ok(pairs)
}

fn decode_pairs_streamed<S: ReadFrame>(src: &mut S) -> Result<Vec<(Value, Value)>> {
    let mut pairs = Vec::new();
    loop {
        let header = src.read_line()?;
        if is_stream_end(&header) {
            return Ok(pairs);
        }
        let key = decode_frame(&header, src)?;
        let value = decode(src)?;
        pairs.push((key, value));
    }
}

/// Streamed bulk chunks: `;N` headers until the `;0` terminator.
fn read_chunks<S: ReadFrame>(src: &mut S) -> Result<Bytes> {
    let mut data = BytesMut::new();
    loop {
        let header = src.read_line()?;
        let (&marker, body) = header.split_first().ok_or(ProtocolError::EmptyHeader)?;
        if marker != markers::CHUNK {
            return Err(ProtocolError::InvalidTypeMarker(marker).into());
        }
        let n = parse_integer(body)?;
        if n == 0 {
            return Ok(data.freeze());
        }
        if n < 0 {
            return Err(ProtocolError::InvalidLength(lossy(body)).into());
        }
        data.extend_from_slice(&read_payload(src, n as usize)?);
    }
}

/// `n` payload bytes followed by their CRLF terminator.
fn read_payload<S: ReadFrame>(src: &mut S, n: usize) -> Result<Bytes> {
    let payload = src.read_exact(n)?;
    let terminator = src.read_exact(2)?;
    if &terminator[..] != super::CRLF {
        return Err(ProtocolError::MissingCrlf.into());
    }
    Ok(payload)
}

fn is_stream_end(header: &[u8]) -> bool {
    header == [markers::STREAM_END].as_slice()
}

fn utf8(body: &[u8]) -> Result<&str> {
    std::str::from_utf8(body).map_err(|_| ProtocolError::InvalidUtf8.into())
}

fn parse_integer(body: &[u8]) -> Result<i64> {
    let s = utf8(body)?;
    Ok(s.parse::<i64>().map_err(ProtocolError::from)?)
}

fn parse_double(body: &[u8]) -> Result<f64> {
    // f64's FromStr accepts `inf`, `-inf`, and `nan` directly.
    let s = utf8(body)?;
    Ok(s.parse::<f64>().map_err(ProtocolError::from)?)
}

fn parse_big_number(body: &[u8]) -> Result<String> {
    let s = utf8(body)?;
    let digits = s.strip_prefix('-').or_else(|| s.strip_prefix('+')).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::InvalidInteger(s.to_string()).into());
    }
    Ok(s.to_string())
}

fn lossy(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}


#[cfg(test)]
mod proptest_tests {
    use super::tests_support::SliceSource;
    use super::*;
    use crate::protocol::encode_command;
    use proptest::prelude::*;

    proptest! {
        /// Decoding a server echo of an encoded command yields the same
        /// sequence of byte-strings.
        #[test]
        fn command_roundtrip(args in prop::collection::vec(
            prop::collection::vec(any::<u8>(), 0..64),
            1..8,
        )) {
            let mut buf = bytes::BytesMut::new();
            encode_command(&mut buf, &args);

            let mut src = SliceSource::new(&buf);
            let value = decode(&mut src).unwrap();
            let items = value.into_array().unwrap();
            prop_assert_eq!(items.len(), args.len());
            for (item, arg) in items.iter().zip(&args) {
                prop_assert_eq!(item.as_bytes().unwrap(), &arg[..]);
            }
        }

        /// The decoder never panics on arbitrary input.
        #[test]
        fn decoder_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
            let mut src = SliceSource::new(&data);
            let _ = decode(&mut src);
        }
    }
}
