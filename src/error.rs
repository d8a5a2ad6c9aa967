use bytes::Bytes;
use std::fmt;
use std::io;
use thiserror::Error;

// ── Reply-level errors ─────────────────────────────────────────────

/// Structured error kinds for programmatic matching on `-` replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyErrorKind {
    /// Generic ERR
    Err,
    /// WRONGTYPE Operation against a key holding the wrong kind of value
    WrongType,
    /// Any other error prefix
    Other(String),
}

impl ReplyErrorKind {
    /// Classify an error message by its leading word.
    pub fn from_message(msg: &str) -> Self {
        match msg.split_whitespace().next().unwrap_or("") {
            "ERR" => Self::Err,
            "WRONGTYPE" => Self::WrongType,
            other => Self::Other(other.to_string()),
        }
    }
}

/// An error reply (`-<message>\r\n`) decoded from the stream.
///
/// This is a well-framed value, not a decoding failure: decoding continues
/// normally after one is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ReplyError {
    kind: ReplyErrorKind,
    message: String,
}

impl ReplyError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = ReplyErrorKind::from_message(&message);
        Self { kind, message }
    }

    pub fn kind(&self) -> &ReplyErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// First word of the message, e.g. `ERR` or `WRONGTYPE`.
    pub fn code(&self) -> &str {
        self.message.split_whitespace().next().unwrap_or("")
    }
}

// ── Fatal framing errors ───────────────────────────────────────────

/// What made the byte stream unparseable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserErrorKind {
    /// A value started with a byte that is not one of `+ - : $ *`.
    UnknownType(u8),
    /// A length, count or integer line contained a non-digit byte.
    InvalidDigit(u8),
    /// A CR was followed by something other than LF.
    MissingLineFeed,
    /// Bulk string payload was not followed by CR LF.
    BadBulkTerminator,
}

/// Unrecoverable framing corruption.
///
/// Carries a snapshot of the buffer that was being scanned and the offset
/// of the offending byte within it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ParserError {
    kind: ParserErrorKind,
    buffer: Bytes,
    offset: usize,
}

impl ParserError {
    pub fn new(kind: ParserErrorKind, buffer: Bytes, offset: usize) -> Self {
        Self {
            kind,
            buffer,
            offset,
        }
    }

    pub fn kind(&self) -> ParserErrorKind {
        self.kind
    }

    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParserErrorKind::UnknownType(b) => write!(
                f,
                "Protocol error, got {:?} as reply type byte",
                (b as char).to_string()
            )?,
            ParserErrorKind::InvalidDigit(b) => {
                write!(f, "Protocol error, invalid byte 0x{b:02x} in number")?
            }
            ParserErrorKind::MissingLineFeed => {
                write!(f, "Protocol error, expected \\n after \\r")?
            }
            ParserErrorKind::BadBulkTerminator => {
                write!(f, "Protocol error, bulk string not terminated by \\r\\n")?
            }
        }
        write!(f, " (offset {} of {} buffered bytes)", self.offset, self.buffer.len())
    }
}

/// What the decoder's error continuation receives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A `-` reply.
    #[error(transparent)]
    Reply(#[from] ReplyError),
    /// Framing corruption, routed here only when no fatal continuation was given.
    #[error(transparent)]
    Fatal(#[from] ParserError),
}

impl DecodeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

// ── Crate-level errors ─────────────────────────────────────────────

/// Misuse of the construction/configuration API, and I/O in the server.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ── Tests ──────────────────────────────────────────────────────────
