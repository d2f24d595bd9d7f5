//! Decoded protocol values.

use crate::error::CommandError;
use bytes::Bytes;

/// One decoded RESP3 value.
///
/// Server-reported errors are carried as the [`Value::Error`] variant rather
/// than raised, so a pipeline can associate each error with the slot of the
/// command that produced it. Attribute frames wrap the value they precede in
/// [`Value::Attributed`]; equality looks through the wrapper.
#[derive(Debug, Clone)]
pub enum Value {
    /// Simple string (`+`)
    Simple(String),
    /// Bulk string (`$`); an empty bulk is not [`Value::Null`]
    Bulk(Bytes),
    /// 64-bit signed integer (`:`)
    Integer(i64),
    /// Double (`,`), including `inf`, `-inf`, and `nan`
    Double(f64),
    /// Boolean (`#`)
    Boolean(bool),
    /// Arbitrary-precision decimal integer, as text (`(`)
    BigNumber(String),
    /// Bulk-like string with a three-character content-type tag (`=`)
    Verbatim {
        /// Content-type tag, e.g. `txt` or `mkd`
        format: String,
        /// Payload after the tag and colon separator
        data: Bytes,
    },
    /// Null (`_`, `$-1`, `*-1`)
    Null,
    /// Ordered sequence (`*`)
    Array(Vec<Value>),
    /// Key/value pairs in wire order, keys not deduplicated (`%`)
    Map(Vec<(Value, Value)>),
    /// Unordered-semantics collection in wire order (`~`)
    Set(Vec<Value>),
    /// Out-of-band server message; first element is the event tag (`>`)
    Push(Vec<Value>),
    /// Server-reported error (`-` or `!`)
    Error(CommandError),
    /// A value annotated by a preceding attribute frame (`|`)
    Attributed {
        /// The metadata pairs
        attrs: Vec<(Value, Value)>,
        /// The annotated value
        value: Box<Value>,
    },
}

impl Value {
    /// The value with any attribute wrappers removed.
    pub fn strip_attributes(&self) -> &Value {
        let mut v = self;
        while let Value::Attributed { value, .. } = v {
            v = value;
        }
        v
    }

    /// Attribute pairs annotating this value, if any.
    pub fn attributes(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Attributed { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    /// Check for null, looking through attributes.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self.strip_attributes(), Value::Null)
    }

    /// Try to view the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self.strip_attributes() {
            Value::Simple(s) | Value::BigNumber(s) => Some(s),
            Value::Bulk(b) => std::str::from_utf8(b).ok(),
            Value::Verbatim { data, .. } => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    /// Try to view the value as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self.strip_attributes() {
            Value::Simple(s) => Some(s.as_bytes()),
            Value::Bulk(b) => Some(b),
            Value::Verbatim { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Try to get the value as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self.strip_attributes() {
            Value::Integer(n) => Some(*n),
            Value::Bulk(b) => std::str::from_utf8(b).ok()?.parse().ok(),
            Value::Simple(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get the value as a double.
    pub fn as_double(&self) -> Option<f64> {
        match self.strip_attributes() {
            Value::Double(d) => Some(*d),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Try to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self.strip_attributes() {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to view the value as an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self.strip_attributes() {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Try to view the value as map pairs.
    pub fn as_pairs(&self) -> Option<&[(Value, Value)]> {
        match self.strip_attributes() {
            Value::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Try to view the value as a server-reported error.
    pub fn as_error(&self) -> Option<&CommandError> {
        match self.strip_attributes() {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Consume the value into its array elements, dropping attributes.
    pub fn into_array(self) -> Option<Vec<Value>> {
        match self.into_stripped() {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    fn into_stripped(self) -> Value {
        let mut v = self;
        while let Value::Attributed { value, .. } = v {
            v = *value;
        }
        v
    }
}

// Attributes do not participate in equality; `nan == nan` holds so that
// decoded replies compare structurally.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self.strip_attributes(), other.strip_attributes()) {
            (Value::Simple(a), Value::Simple(b)) => a == b,
            (Value::Bulk(a), Value::Bulk(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::BigNumber(a), Value::BigNumber(b)) => a == b,
            (
                Value::Verbatim { format: fa, data: da },
                Value::Verbatim { format: fb, data: db },
            ) => fa == fb && da == db,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Push(a), Value::Push(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bulk(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Bulk(Bytes::from(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributed(value: Value) -> Value {
        Value::Attributed {
            attrs: vec![(Value::Simple("ttl".into()), Value::Integer(3600))],
            value: Box::new(value),
        }
    }

    #[test]
    fn test_null_and_empty_bulk_are_distinct() {
        assert_ne!(Value::Null, Value::Bulk(Bytes::new()));
        assert!(Value::Null.is_null());
        assert!(!Value::Bulk(Bytes::new()).is_null());
    }

    #[test]
    fn test_attributes_do_not_change_equality() {
        let plain = Value::Simple("OK".into());
        assert_eq!(attributed(plain.clone()), plain);
        assert_eq!(plain, attributed(plain.clone()));
        assert_eq!(attributed(plain.clone()), attributed(plain.clone()));
    }

    #[test]
    fn test_accessors_look_through_attributes() {
        let v = attributed(Value::Integer(7));
        assert_eq!(v.as_integer(), Some(7));
        assert!(v.attributes().is_some());
        assert!(v.strip_attributes().attributes().is_none());

        let v = attributed(Value::Array(vec![Value::Integer(1)]));
        assert_eq!(v.as_array().map(<[Value]>::len), Some(1));
        assert_eq!(v.into_array().map(|items| items.len()), Some(1));
    }

    #[test]
    fn test_nan_compares_equal_to_itself() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(f64::NAN), Value::Double(0.0));
    }

    #[test]
    fn test_as_integer_parses_textual_replies() {
        assert_eq!(Value::Bulk(Bytes::from("42")).as_integer(), Some(42));
        assert_eq!(Value::Simple("-3".into()).as_integer(), Some(-3));
        assert_eq!(Value::Simple("OK".into()).as_integer(), None);
    }

    #[test]
    fn test_as_error() {
        let err = Value::Error(crate::error::CommandError::new("ERR nope"));
        assert_eq!(err.as_error().map(|e| e.code.as_str()), Some("ERR"));
        assert_eq!(attributed(err).as_error().map(|e| e.code.as_str()), Some("ERR"));
    }
}
