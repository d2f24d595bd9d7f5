//! Cursor-driven scans.

use super::Session;
use crate::error::{Error, Result};
use crate::protocol::Value;
use std::collections::VecDeque;

/// Lazy iterator over a cursor scan.
///
/// Each page issues the verb with the cursor returned by the previous page
/// (initially `0`) and yields the page's elements one by one. Traversal
/// ends when the returned cursor is the string `"0"`; the comparison is
/// textual, so an opaque cursor like `"00"` keeps iterating. The sequence
/// is not restartable: every traversal performs a fresh server-side
/// iteration.
pub struct ScanIter<'a> {
    session: &'a mut Session,
    /// Verb and, for key-bound scans, the key.
    prefix: Vec<Vec<u8>>,
    /// Trailing arguments (MATCH, COUNT, ...).
    args: Vec<Vec<u8>>,
    cursor: String,
    buffered: VecDeque<Value>,
    done: bool,
}

impl<'a> ScanIter<'a> {
    pub(crate) fn new(session: &'a mut Session, prefix: Vec<Vec<u8>>, args: Vec<Vec<u8>>) -> Self {
        Self {
            session,
            prefix,
            args,
            cursor: "0".to_string(),
            buffered: VecDeque::new(),
            done: false,
        }
    }

    fn fetch_page(&mut self) -> Result<()> {
        let mut command: Vec<&[u8]> =
            Vec::with_capacity(self.prefix.len() + 1 + self.args.len());
        command.extend(self.prefix.iter().map(Vec::as_slice));
        command.push(self.cursor.as_bytes());
        command.extend(self.args.iter().map(Vec::as_slice));

        let reply = self.session.call(&command)?;

        // Every page is a (next-cursor, elements) pair.
        let mut parts = reply.into_array().ok_or_else(malformed)?;
        if parts.len() != 2 {
            return Err(malformed());
        }
        let elements = match parts.pop().and_then(Value::into_array) {
            Some(elements) => elements,
            None => return Err(malformed()),
        };
        let cursor = match parts.pop().as_ref().and_then(Value::as_str) {
            Some(cursor) => cursor.to_string(),
            None => return Err(malformed()),
        };

        self.buffered.extend(elements);
        self.done = cursor == "0";
        self.cursor = cursor;
        Ok(())
    }
}

fn malformed() -> Error {
    Error::Connection("malformed scan reply".into())
}

impl Iterator for ScanIter<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(element) = self.buffered.pop_front() {
                return Some(Ok(element));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
