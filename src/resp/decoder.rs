//! Incremental, push-driven RESP decoder.
//!
//! [`Decoder::feed`] takes byte chunks exactly as they come off a transport,
//! however they happen to be split, and calls its continuations once for
//! every complete top-level value, in stream order. Nothing blocks and
//! nothing is returned: partial state stays inside the decoder until the next
//! chunk arrives.
//!
//! Three kinds of partial state survive between calls:
//!
//! - an unconsumed tail of the current chunk (a line whose CR LF has not
//!   arrived). The next chunk is appended to it, which is the only copy made
//!   for small values.
//! - a bulk string longer than what is buffered. Further chunks are kept in
//!   a backlog untouched until the last byte of the value shows up, then the
//!   value is reassembled in one pass.
//! - arrays whose elements are not all decoded yet, kept as a stack of
//!   partially filled frames with the innermost array on top.

use bytes::{Bytes, BytesMut};
use std::mem;
use tracing::{trace, warn};

use crate::config::DecoderConfig;
use crate::error::{DecodeError, Error, ParserError, ParserErrorKind, ReplyError, Result};
use crate::resp::parser::{parse_integer, parse_length, read_line, Fault};
use crate::resp::scratch::SharedScratchPool;
use crate::resp::types::{RespString, RespValue};
use crate::resp::utf8::decode_fragments;

/// Continuation for decoded values.
pub type ReplyFn = Box<dyn FnMut(RespValue) + Send>;
/// Continuation for `-` replies (and fatal errors without their own handler).
pub type ErrorFn = Box<dyn FnMut(DecodeError) + Send>;
/// Continuation for framing corruption.
pub type FatalFn = Box<dyn FnMut(ParserError) + Send>;

const SIMPLE_STRING: u8 = b'+';
const ERROR: u8 = b'-';
const INTEGER: u8 = b':';
const BULK_STRING: u8 = b'$';
const ARRAY: u8 = b'*';

/// Upper bound on slots reserved up front for an announced array length.
const MAX_PREALLOC: usize = 1024;

/// Outcome of one value parser.
enum Parsed {
    Value(RespValue),
    /// An array header with a positive count: its elements follow.
    ArrayStart(usize),
    /// Not enough bytes buffered.
    Incomplete,
}

/// A suspended array.
#[derive(Debug)]
struct ArrayFrame {
    items: Vec<RespValue>,
    len: usize,
}

impl ArrayFrame {
    fn new(len: usize) -> Self {
        Self {
            items: Vec::with_capacity(len.min(MAX_PREALLOC)),
            len,
        }
    }

    fn is_full(&self) -> bool {
        self.items.len() == self.len
    }
}

/// Per-connection RESP decoder.
pub struct Decoder {
    on_reply: ReplyFn,
    on_protocol_error: ErrorFn,
    on_fatal_error: Option<FatalFn>,
    config: DecoderConfig,
    /// Created on first raw reassembly unless one was injected.
    scratch: Option<SharedScratchPool>,

    current_chunk: Option<Bytes>,
    cursor: usize,

    /// End of the pending bulk string (payload and CR LF), counted from the
    /// start of `chunk_backlog[0]`. Zero when nothing is pending.
    pending_bulk_target: usize,
    /// Bytes held in `chunk_backlog`.
    pending_bulk_accumulated: usize,
    /// Payload start within `chunk_backlog[0]`.
    pending_bulk_start: usize,
    chunk_backlog: Vec<Bytes>,

    array_stack: Vec<ArrayFrame>,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("config", &self.config)
            .field("buffered", &self.current_chunk.as_ref().map(|c| c.len() - self.cursor))
            .field("pending_bulk_target", &self.pending_bulk_target)
            .field("pending_bulk_accumulated", &self.pending_bulk_accumulated)
            .field("backlog_chunks", &self.chunk_backlog.len())
            .field("pending_arrays", &self.array_stack.len())
            .finish()
    }
}

impl Decoder {
    /// Create a decoder from its continuations and options.
    ///
    /// Without `on_fatal_error`, framing errors go to `on_protocol_error` as
    /// [`DecodeError::Fatal`].
    pub fn new<R, E, F>(
        on_reply: R,
        on_protocol_error: E,
        on_fatal_error: Option<F>,
        return_raw_bytes: bool,
        return_big_numbers_as_text: bool,
    ) -> Self
    where
        R: FnMut(RespValue) + Send + 'static,
        E: FnMut(DecodeError) + Send + 'static,
        F: FnMut(ParserError) + Send + 'static,
    {
        let config = DecoderConfig::builder()
            .return_raw_bytes(return_raw_bytes)
            .return_big_numbers_as_text(return_big_numbers_as_text)
            .build();
        Self::from_parts(
            Box::new(on_reply),
            Box::new(on_protocol_error),
            on_fatal_error.map(|f| Box::new(f) as FatalFn),
            config,
            None,
        )
    }

    pub fn builder() -> DecoderBuilder {
        DecoderBuilder::default()
    }

    fn from_parts(
        on_reply: ReplyFn,
        on_protocol_error: ErrorFn,
        on_fatal_error: Option<FatalFn>,
        config: DecoderConfig,
        scratch: Option<SharedScratchPool>,
    ) -> Self {
        Self {
            on_reply,
            on_protocol_error,
            on_fatal_error,
            config,
            scratch,
            current_chunk: None,
            cursor: 0,
            pending_bulk_target: 0,
            pending_bulk_accumulated: 0,
            pending_bulk_start: 0,
            chunk_backlog: Vec::new(),
            array_stack: Vec::new(),
        }
    }

    pub fn config(&self) -> DecoderConfig {
        self.config
    }

    pub fn set_return_raw_bytes(&mut self, enabled: bool) {
        self.config.return_raw_bytes = enabled;
    }

    pub fn set_return_big_numbers_as_text(&mut self, enabled: bool) {
        self.config.return_big_numbers_as_text = enabled;
    }

    /// Drop all partial state.
    pub fn reset(&mut self) {
        self.current_chunk = None;
        self.cursor = 0;
        self.pending_bulk_target = 0;
        self.pending_bulk_accumulated = 0;
        self.pending_bulk_start = 0;
        self.chunk_backlog.clear();
        self.array_stack.clear();
    }

    /// True when no partial value is buffered.
    pub fn is_idle(&self) -> bool {
        self.current_chunk.is_none() && self.pending_bulk_target == 0 && self.array_stack.is_empty()
    }

    /// Number of arrays currently waiting for elements.
    pub fn pending_arrays(&self) -> usize {
        self.array_stack.len()
    }

    /// Push the next chunk of the stream.
    pub fn feed(&mut self, chunk: impl Into<Bytes>) {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }

        if self.pending_bulk_target > 0 {
            if self.pending_bulk_accumulated + chunk.len() < self.pending_bulk_target {
                self.pending_bulk_accumulated += chunk.len();
                self.chunk_backlog.push(chunk);
                trace!(
                    accumulated = self.pending_bulk_accumulated,
                    target = self.pending_bulk_target,
                    "buffered bulk string chunk"
                );
                return;
            }
            match self.finish_bulk(chunk) {
                Ok(value) => self.settle(value),
                Err((fault, snapshot)) => return self.fatal(fault, snapshot),
            }
        } else {
            match self.current_chunk.take() {
                Some(current) if self.cursor < current.len() => {
                    let tail = &current[self.cursor..];
                    let mut joined = BytesMut::with_capacity(tail.len() + chunk.len());
                    joined.extend_from_slice(tail);
                    joined.extend_from_slice(&chunk);
                    self.current_chunk = Some(joined.freeze());
                }
                _ => self.current_chunk = Some(chunk),
            }
            self.cursor = 0;
        }

        self.run();
    }

    /// The type-dispatch loop over `current_chunk`.
    fn run(&mut self) {
        while let Some(chunk) = self.current_chunk.clone() {
            if self.cursor >= chunk.len() {
                self.current_chunk = None;
                self.cursor = 0;
                return;
            }

            let start = self.cursor;
            match self.parse_value(&chunk) {
                Ok(Parsed::Value(value)) => self.settle(value),
                Ok(Parsed::ArrayStart(len)) => self.array_stack.push(ArrayFrame::new(len)),
                Ok(Parsed::Incomplete) => {
                    if self.pending_bulk_target == 0 {
                        self.cursor = start;
                    }
                    return;
                }
                Err(fault) => return self.fatal(fault, chunk),
            }
        }
    }

    /// Place a completed value in the innermost suspended array, or deliver
    /// it if there is none. Arrays that become full are closed the same way.
    fn settle(&mut self, mut value: RespValue) {
        while let Some(frame) = self.array_stack.last_mut() {
            frame.items.push(value);
            if !frame.is_full() {
                return;
            }
            let Some(frame) = self.array_stack.pop() else {
                return;
            };
            value = RespValue::Array(frame.items);
        }
        self.emit(value);
    }

    fn emit(&mut self, value: RespValue) {
        match value {
            RespValue::Error(err) => (self.on_protocol_error)(DecodeError::Reply(err)),
            value => (self.on_reply)(value),
        }
    }

    fn fatal(&mut self, fault: Fault, snapshot: Bytes) {
        let err = ParserError::new(fault.kind, snapshot, fault.offset);
        warn!(offset = fault.offset, "{err}");
        self.reset();
        match self.on_fatal_error.as_mut() {
            Some(on_fatal) => on_fatal(err),
            None => (self.on_protocol_error)(DecodeError::Fatal(err)),
        }
    }

    // ── Value parsers ──────────────────────────────────────────────

    fn parse_value(&mut self, chunk: &Bytes) -> std::result::Result<Parsed, Fault> {
        let tag = chunk[self.cursor];
        self.cursor += 1;
        match tag {
            SIMPLE_STRING => self.parse_simple_string(chunk),
            ERROR => self.parse_error(chunk),
            INTEGER => self.parse_integer(chunk),
            BULK_STRING => self.parse_bulk_string(chunk),
            ARRAY => self.parse_array(chunk),
            other => Err(Fault {
                kind: ParserErrorKind::UnknownType(other),
                offset: self.cursor - 1,
            }),
        }
    }

    fn parse_simple_string(&mut self, chunk: &Bytes) -> std::result::Result<Parsed, Fault> {
        let Some(line) = read_line(chunk, self.cursor)? else {
            return Ok(Parsed::Incomplete);
        };
        self.cursor = line.next();
        let text = self.string(chunk.slice(line.start..line.end));
        Ok(Parsed::Value(RespValue::SimpleString(text)))
    }

    fn parse_error(&mut self, chunk: &Bytes) -> std::result::Result<Parsed, Fault> {
        let Some(line) = read_line(chunk, self.cursor)? else {
            return Ok(Parsed::Incomplete);
        };
        self.cursor = line.next();
        let message = String::from_utf8_lossy(&chunk[line.start..line.end]);
        Ok(Parsed::Value(RespValue::Error(ReplyError::new(message))))
    }

    fn parse_integer(&mut self, chunk: &Bytes) -> std::result::Result<Parsed, Fault> {
        let Some(line) = read_line(chunk, self.cursor)? else {
            return Ok(Parsed::Incomplete);
        };
        let value = parse_integer(chunk, line, self.config.return_big_numbers_as_text)?;
        self.cursor = line.next();
        Ok(Parsed::Value(value))
    }

    fn parse_bulk_string(&mut self, chunk: &Bytes) -> std::result::Result<Parsed, Fault> {
        let Some(line) = read_line(chunk, self.cursor)? else {
            return Ok(Parsed::Incomplete);
        };
        let Some(len) = parse_length(chunk, line)? else {
            self.cursor = line.next();
            return Ok(Parsed::Value(RespValue::Null));
        };

        let start = line.next();
        let end = start + len;
        if end + 2 > chunk.len() {
            // Hand the rest of the stream over to reassembly.
            self.pending_bulk_start = start;
            self.pending_bulk_target = end + 2;
            self.pending_bulk_accumulated = chunk.len();
            self.chunk_backlog.push(chunk.clone());
            self.current_chunk = None;
            self.cursor = 0;
            trace!(len, buffered = chunk.len() - start, "bulk string spans chunks");
            return Ok(Parsed::Incomplete);
        }

        if &chunk[end..end + 2] != b"\r\n" {
            return Err(Fault {
                kind: ParserErrorKind::BadBulkTerminator,
                offset: end,
            });
        }
        self.cursor = end + 2;
        Ok(Parsed::Value(RespValue::BulkString(self.string(chunk.slice(start..end)))))
    }

    fn parse_array(&mut self, chunk: &Bytes) -> std::result::Result<Parsed, Fault> {
        let Some(line) = read_line(chunk, self.cursor)? else {
            return Ok(Parsed::Incomplete);
        };
        let len = parse_length(chunk, line)?;
        self.cursor = line.next();
        Ok(match len {
            None => Parsed::Value(RespValue::Null),
            Some(0) => Parsed::Value(RespValue::Array(Vec::new())),
            Some(len) => Parsed::ArrayStart(len),
        })
    }

    fn string(&self, bytes: Bytes) -> RespString {
        if self.config.return_raw_bytes {
            RespString::Raw(bytes)
        } else {
            RespString::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    // ── Reassembly ─────────────────────────────────────────────────

    /// Reassemble the pending bulk string now that `chunk` completes it.
    ///
    /// `chunk` becomes the current chunk, positioned just past the value.
    fn finish_bulk(&mut self, chunk: Bytes) -> std::result::Result<RespValue, (Fault, Bytes)> {
        let used = self.pending_bulk_target - self.pending_bulk_accumulated;
        let start = self.pending_bulk_start;
        let len = self.pending_bulk_target - start - 2;

        let mut backlog = mem::take(&mut self.chunk_backlog);
        backlog.push(chunk.clone());
        self.pending_bulk_target = 0;
        self.pending_bulk_accumulated = 0;
        self.pending_bulk_start = 0;
        self.current_chunk = Some(chunk);
        self.cursor = used;

        let terminator = span(&backlog, start + len, 2);
        let bytes = terminator.iter().flat_map(|f| f.iter().copied());
        if let Some(bad) = bytes.zip(*b"\r\n").position(|(got, want)| got != want) {
            // Report the offending byte within the chunk that holds it.
            let (index, offset) = locate(&backlog, start + len + bad);
            let fault = Fault {
                kind: ParserErrorKind::BadBulkTerminator,
                offset,
            };
            return Err((fault, backlog[index].clone()));
        }

        let fragments = span(&backlog, start, len);
        trace!(len, chunks = backlog.len(), "reassembling bulk string");
        let value = match fragments.as_slice() {
            [] => self.string(Bytes::new()),
            [single] => self.string(single.clone()),
            many if self.config.return_raw_bytes => {
                let slices: Vec<&[u8]> = many.iter().map(|f| f.as_ref()).collect();
                let pool = self.scratch.get_or_insert_with(SharedScratchPool::new);
                RespString::Raw(pool.assemble(&slices, len))
            }
            many => RespString::Text(decode_fragments(many.iter().map(|f| f.as_ref()), len)),
        };
        Ok(RespValue::BulkString(value))
    }
}

/// Slices of `chunks` covering `len` bytes from `start` (counted from the
/// beginning of the first chunk).
fn span(chunks: &[Bytes], start: usize, len: usize) -> Vec<Bytes> {
    let mut out = Vec::with_capacity(chunks.len());
    let mut skip = start;
    let mut remaining = len;
    for chunk in chunks {
        if remaining == 0 {
            break;
        }
        if skip >= chunk.len() {
            skip -= chunk.len();
            continue;
        }
        let take = (chunk.len() - skip).min(remaining);
        out.push(chunk.slice(skip..skip + take));
        remaining -= take;
        skip = 0;
    }
    out
}

/// Chunk index and in-chunk offset of absolute position `pos`.
fn locate(chunks: &[Bytes], mut pos: usize) -> (usize, usize) {
    for (index, chunk) in chunks.iter().enumerate() {
        if pos < chunk.len() {
            return (index, pos);
        }
        pos -= chunk.len();
    }
    (chunks.len().saturating_sub(1), pos)
}

// ── Builder ────────────────────────────────────────────────────────

/// Builder for [`Decoder`]; `build` fails if a mandatory continuation is missing.
#[derive(Default)]
pub struct DecoderBuilder {
    on_reply: Option<ReplyFn>,
    on_protocol_error: Option<ErrorFn>,
    on_fatal_error: Option<FatalFn>,
    config: DecoderConfig,
    scratch: Option<SharedScratchPool>,
}

impl DecoderBuilder {
    pub fn on_reply(mut self, f: impl FnMut(RespValue) + Send + 'static) -> Self {
        self.on_reply = Some(Box::new(f));
        self
    }

    pub fn on_protocol_error(mut self, f: impl FnMut(DecodeError) + Send + 'static) -> Self {
        self.on_protocol_error = Some(Box::new(f));
        self
    }

    pub fn on_fatal_error(mut self, f: impl FnMut(ParserError) + Send + 'static) -> Self {
        self.on_fatal_error = Some(Box::new(f));
        self
    }

    pub fn return_raw_bytes(mut self, enabled: bool) -> Self {
        self.config.return_raw_bytes = enabled;
        self
    }

    pub fn return_big_numbers_as_text(mut self, enabled: bool) -> Self {
        self.config.return_big_numbers_as_text = enabled;
        self
    }

    pub fn config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Reassemble raw bulk strings into a shared arena.
    pub fn scratch_pool(mut self, pool: SharedScratchPool) -> Self {
        self.scratch = Some(pool);
        self
    }

    pub fn build(self) -> Result<Decoder> {
        let on_reply = self
            .on_reply
            .ok_or_else(|| Error::InvalidArgument("on_reply continuation is required".into()))?;
        let on_protocol_error = self.on_protocol_error.ok_or_else(|| {
            Error::InvalidArgument("on_protocol_error continuation is required".into())
        })?;
        Ok(Decoder::from_parts(
            on_reply,
            on_protocol_error,
            self.on_fatal_error,
            self.config,
            self.scratch,
        ))
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Reply(RespValue),
        Error(DecodeError),
        Fatal(ParserError),
    }

    fn decoder(config: DecoderConfig) -> (Decoder, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (r, e, f) = (events.clone(), events.clone(), events.clone());
        let decoder = Decoder::builder()
            .config(config)
            .on_reply(move |v| r.lock().push(Event::Reply(v)))
            .on_protocol_error(move |err| e.lock().push(Event::Error(err)))
            .on_fatal_error(move |err| f.lock().push(Event::Fatal(err)))
            .build()
            .unwrap();
        (decoder, events)
    }

    fn text() -> DecoderConfig {
        DecoderConfig::default()
    }

    fn raw() -> DecoderConfig {
        DecoderConfig::builder().return_raw_bytes(true).build()
    }

    fn replies(events: &Arc<Mutex<Vec<Event>>>) -> Vec<RespValue> {
        events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Reply(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    fn bulk(s: &str) -> RespValue {
        RespValue::BulkString(s.into())
    }

    #[test]
    fn builder_requires_continuations() {
        let err = Decoder::builder().on_protocol_error(|_| {}).build().unwrap_err();
        assert!(err.to_string().contains("on_reply"));
        let err = Decoder::builder().on_reply(|_| {}).build().unwrap_err();
        assert!(err.to_string().contains("on_protocol_error"));
    }

    #[test]
    fn simple_values_in_one_chunk() {
        let (mut d, events) = decoder(text());
        d.feed(&b"+OK\r\n:42\r\n$5\r\nhello\r\n$-1\r\n*0\r\n*-1\r\n"[..]);
        assert_eq!(
            replies(&events),
            vec![
                RespValue::SimpleString("OK".into()),
                RespValue::Integer(42),
                bulk("hello"),
                RespValue::Null,
                RespValue::Array(vec![]),
                RespValue::Null,
            ]
        );
        assert!(d.is_idle());
    }

    #[test]
    fn error_reply_goes_to_error_continuation() {
        let (mut d, events) = decoder(text());
        d.feed(&b"-ERR bad\r\n+OK\r\n"[..]);
        let events = events.lock();
        assert_eq!(
            events[0],
            Event::Error(DecodeError::Reply(ReplyError::new("ERR bad")))
        );
        assert_eq!(events[1], Event::Reply(RespValue::SimpleString("OK".into())));
    }

    #[test]
    fn error_inside_array_stays_in_array() {
        let (mut d, events) = decoder(text());
        d.feed(&b"*2\r\n-ERR x\r\n:1\r\n"[..]);
        assert_eq!(
            replies(&events),
            vec![RespValue::Array(vec![
                RespValue::Error(ReplyError::new("ERR x")),
                RespValue::Integer(1),
            ])]
        );
    }

    #[test]
    fn partial_line_rolls_back_to_type_byte() {
        let (mut d, events) = decoder(text());
        d.feed(&b"+OK\r\n+PO"[..]);
        assert_eq!(replies(&events).len(), 1);
        assert!(!d.is_idle());
        d.feed(&b"NG\r\n"[..]);
        assert_eq!(replies(&events)[1], RespValue::SimpleString("PONG".into()));
        assert!(d.is_idle());
    }

    #[test]
    fn bulk_string_split_keeps_backlog_until_complete() {
        let (mut d, events) = decoder(text());
        d.feed(&b"$10\r\n01"[..]);
        d.feed(&b"2345"[..]);
        assert_eq!(d.pending_bulk_accumulated, 11);
        assert_eq!(d.pending_bulk_target, 17);
        assert_eq!(d.chunk_backlog.len(), 2);
        assert!(replies(&events).is_empty());
        d.feed(&b"6789\r\n:1\r\n"[..]);
        assert_eq!(replies(&events), vec![bulk("0123456789"), RespValue::Integer(1)]);
        assert!(d.chunk_backlog.is_empty());
        assert!(d.is_idle());
    }

    #[test]
    fn bulk_terminator_split_alone() {
        let (mut d, events) = decoder(raw());
        d.feed(&b"$3\r\nabc\r"[..]);
        d.feed(&b"\n"[..]);
        assert_eq!(
            replies(&events),
            vec![RespValue::BulkString(Bytes::from_static(b"abc").into())]
        );
    }

    #[test]
    fn raw_reassembly_uses_scratch_pool() {
        let pool = SharedScratchPool::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut d = Decoder::builder()
            .return_raw_bytes(true)
            .scratch_pool(pool.clone())
            .on_reply(move |v| sink.lock().push(v))
            .on_protocol_error(|_| {})
            .build()
            .unwrap();
        d.feed(&b"$6\r\nab"[..]);
        d.feed(&b"cd"[..]);
        d.feed(&b"ef\r\n"[..]);
        assert_eq!(
            *events.lock(),
            vec![RespValue::BulkString(Bytes::from_static(b"abcdef").into())]
        );
        assert_eq!(pool.stats().offset, 6);
    }

    #[test]
    fn bulk_completion_inside_array() {
        let (mut d, events) = decoder(text());
        d.feed(&b"*3\r\n$3\r\nset\r\n$3\r\nk"[..]);
        d.feed(&b"ey\r\n$5\r\nva"[..]);
        d.feed(&b"lue\r\n"[..]);
        assert_eq!(
            replies(&events),
            vec![RespValue::Array(vec![bulk("set"), bulk("key"), bulk("value")])]
        );
        assert!(d.is_idle());
    }

    #[test]
    fn nested_array_suspends_as_stack() {
        let (mut d, events) = decoder(text());
        d.feed(&b"*2\r\n*2\r\n:1\r\n:"[..]);
        assert_eq!(d.pending_arrays(), 2);
        d.feed(&b"2\r\n:3\r\n"[..]);
        assert_eq!(
            replies(&events),
            vec![RespValue::Array(vec![
                RespValue::Array(vec![RespValue::Integer(1), RespValue::Integer(2)]),
                RespValue::Integer(3),
            ])]
        );
        assert_eq!(d.pending_arrays(), 0);
    }

    #[test]
    fn unknown_type_is_fatal_and_clears_state() {
        let (mut d, events) = decoder(text());
        d.feed(&b"*2\r\n:1\r\nA\r\n"[..]);
        {
            let events = events.lock();
            assert_eq!(events.len(), 1);
            match &events[0] {
                Event::Fatal(err) => {
                    assert_eq!(err.kind(), ParserErrorKind::UnknownType(b'A'));
                    assert_eq!(err.offset(), 8);
                    assert_eq!(&err.buffer()[..], b"*2\r\n:1\r\nA\r\n");
                }
                other => panic!("expected fatal error, got {other:?}"),
            }
        }
        assert!(d.is_idle());
        d.feed(&b":5\r\n"[..]);
        assert_eq!(replies(&events), vec![RespValue::Integer(5)]);
    }

    #[test]
    fn fatal_routes_to_protocol_error_without_handler() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut d = Decoder::new(
            |_| panic!("no reply expected"),
            move |e| sink.lock().push(e),
            None::<fn(ParserError)>,
            false,
            false,
        );
        d.feed(&b"A"[..]);
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_fatal());
    }

    #[test]
    fn bad_bulk_terminator_is_fatal() {
        let (mut d, events) = decoder(text());
        d.feed(&b"$3\r\nabcXY"[..]);
        assert!(matches!(
            &events.lock()[0],
            Event::Fatal(e) if e.kind() == ParserErrorKind::BadBulkTerminator
        ));

        let (mut d, events) = decoder(text());
        d.feed(&b"$3\r\nab"[..]);
        d.feed(&b"cXY"[..]);
        assert!(matches!(
            &events.lock()[0],
            Event::Fatal(e) if e.kind() == ParserErrorKind::BadBulkTerminator
        ));
        assert!(d.is_idle());
    }

    #[test]
    fn bad_terminator_reported_in_chunk_that_holds_it() {
        let (mut d, events) = decoder(text());
        d.feed(&b"$3\r\nabcX"[..]);
        d.feed(&b"Y"[..]);
        match &events.lock()[0] {
            Event::Fatal(e) => {
                assert_eq!(e.kind(), ParserErrorKind::BadBulkTerminator);
                assert_eq!(&e.buffer()[..], b"$3\r\nabcX");
                assert_eq!(e.offset(), 7);
            }
            other => panic!("expected fatal error, got {other:?}"),
        }

        let (mut d, events) = decoder(text());
        d.feed(&b"$3\r\nabc\r"[..]);
        d.feed(&b"Y"[..]);
        match &events.lock()[0] {
            Event::Fatal(e) => {
                assert_eq!(&e.buffer()[..], b"Y");
                assert_eq!(e.offset(), 0);
            }
            other => panic!("expected fatal error, got {other:?}"),
        };
    }

    #[test]
    fn locate_maps_absolute_positions() {
        let chunks = [Bytes::from_static(b"abc"), Bytes::from_static(b"de")];
        assert_eq!(locate(&chunks, 0), (0, 0));
        assert_eq!(locate(&chunks, 2), (0, 2));
        assert_eq!(locate(&chunks, 3), (1, 0));
        assert_eq!(locate(&chunks, 4), (1, 1));
    }

    #[test]
    fn new_accepts_fatal_closure() {
        let fatals = Arc::new(Mutex::new(Vec::new()));
        let sink = fatals.clone();
        let mut d = Decoder::new(
            |_| {},
            |_| panic!("fatal errors have their own continuation"),
            Some(move |e: ParserError| sink.lock().push(e.kind())),
            false,
            false,
        );
        d.feed(&b"A"[..]);
        assert_eq!(*fatals.lock(), vec![ParserErrorKind::UnknownType(b'A')]);
    }

    #[test]
    fn options_can_change_between_feeds() {
        let (mut d, events) = decoder(text());
        d.feed(&b":1\r\n"[..]);
        d.set_return_big_numbers_as_text(true);
        d.set_return_raw_bytes(true);
        d.feed(&b":1\r\n+x\r\n"[..]);
        assert_eq!(
            replies(&events),
            vec![
                RespValue::Integer(1),
                RespValue::BigNumber("1".into()),
                RespValue::SimpleString(Bytes::from_static(b"x").into()),
            ]
        );
    }

    #[test]
    fn reset_discards_partial_state() {
        let (mut d, events) = decoder(text());
        d.feed(&b"*2\r\n$10\r\nabc"[..]);
        assert!(!d.is_idle());
        d.reset();
        assert!(d.is_idle());
        d.feed(&b"+OK\r\n"[..]);
        assert_eq!(replies(&events), vec![RespValue::SimpleString("OK".into())]);
    }

    #[test]
    fn empty_chunk_is_noop() {
        let (mut d, events) = decoder(text());
        d.feed(Bytes::new());
        assert!(d.is_idle());
        assert!(events.lock().is_empty());
    }

    #[test]
    fn span_walks_chunks() {
        let chunks = [
            Bytes::from_static(b"abc"),
            Bytes::from_static(b"def"),
            Bytes::from_static(b"gh"),
        ];
        let parts = span(&chunks, 2, 5);
        let joined: Vec<u8> = parts.iter().flat_map(|p| p.iter().copied()).collect();
        assert_eq!(joined, b"cdefg");
        assert_eq!(parts.len(), 3);
        assert!(span(&chunks, 8, 0).is_empty());
    }
}
