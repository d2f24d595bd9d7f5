//! Command encoding.
//!
//! A command is an array of bulk strings: `*N` followed by one `$L` bulk per
//! argument. The encoder appends to a caller-supplied buffer so that a
//! pipeline can concatenate several commands without intermediate copies.

use super::CRLF;
use bytes::{BufMut, BytesMut};

/// Append one encoded command to `buf`.
///
/// The first argument is the verb; every argument is serialized as a bulk
/// string regardless of its originating type.
pub fn encode_command<A: AsRef<[u8]>>(buf: &mut BytesMut, args: &[A]) {
    debug_assert!(!args.is_empty(), "a command needs at least a verb");

    buf.put_u8(b'*');
    put_decimal(buf, args.len() as i64);
    buf.put_slice(CRLF);
    for arg in args {
        let arg = arg.as_ref();
        buf.put_u8(b'$');
        put_decimal(buf, arg.len() as i64);
        buf.put_slice(CRLF);
        buf.put_slice(arg);
        buf.put_slice(CRLF);
    }
}

/// Write a base-10 integer without allocating.
fn put_decimal(buf: &mut BytesMut, n: i64) {
    let mut digits = [0u8; 20];
    let mut n = n;
    let negative = n < 0;
    if negative {
        n = -n;
    }

    let mut i = digits.len();
    loop {
        i -= 1;
        digits[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    if negative {
        i -= 1;
        digits[i] = b'-';
    }

    buf.put_slice(&digits[i..]);
}
