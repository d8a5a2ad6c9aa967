use bytes::Bytes;

use crate::error::ReplyError;

/// String payload of a simple or bulk string.
///
/// Which variant the decoder produces is decided by its raw-bytes option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespString {
    /// Decoded UTF-8 text (invalid sequences replaced with U+FFFD).
    Text(String),
    /// The exact bytes from the wire.
    Raw(Bytes),
}

impl RespString {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Raw(b) => b,
        }
    }

    /// Text view; `None` for raw bytes that are not valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Raw(b) => std::str::from_utf8(b).ok(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Owned bytes, without copying when already raw.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(s) => Bytes::from(s),
            Self::Raw(b) => b,
        }
    }
}

impl From<&str> for RespString {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RespString {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Bytes> for RespString {
    fn from(b: Bytes) -> Self {
        Self::Raw(b)
    }
}

/// A fully decoded RESP2 value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// +OK\r\n
    SimpleString(RespString),
    /// -ERR message\r\n
    Error(ReplyError),
    /// :1000\r\n
    Integer(i64),
    /// :18446744073709551615\r\n, kept as its exact decimal text
    BigNumber(String),
    /// $6\r\nfoobar\r\n
    BulkString(RespString),
    /// *2\r\n…
    Array(Vec<RespValue>),
    /// $-1\r\n  or  *-1\r\n
    Null,
}

// ── Convenience accessors ──────────────────────────────────────────

impl RespValue {
    /// Try to interpret this value as a UTF-8 string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::SimpleString(s) | Self::BulkString(s) => s.as_str(),
            Self::BigNumber(n) => Some(n),
            _ => None,
        }
    }

    /// Try to interpret this value as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::SimpleString(s) | Self::BulkString(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Try to interpret this value as i64.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::BigNumber(n) => n.parse().ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Try to interpret this value as an array (consumes self).
    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns true when this value represents null / nil.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns the type name as a static string (useful for error messages).
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SimpleString(_) => "simple_string",
            Self::Error(_) => "error",
            Self::Integer(_) => "integer",
            Self::BigNumber(_) => "big_number",
            Self::BulkString(_) => "bulk_string",
            Self::Array(_) => "array",
            Self::Null => "null",
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
