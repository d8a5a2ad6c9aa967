//! Line scanning and number parsing shared by the value parsers.
//!
//! Everything here works on a contiguous byte slice and absolute offsets into
//! it. A CR LF that has not fully arrived yet is reported as `Ok(None)`;
//! malformed bytes are reported as a [`Fault`] pointing at the bad byte.

use memchr::memchr;

use crate::error::ParserErrorKind;
use crate::resp::types::RespValue;

/// Framing fault at a specific offset of the scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fault {
    pub kind: ParserErrorKind,
    pub offset: usize,
}

impl Fault {
    fn new(kind: ParserErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

/// A terminator-delimited line inside the scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line {
    /// First byte of the line.
    pub start: usize,
    /// Index of the `\r`.
    pub end: usize,
}

impl Line {
    /// Offset of the first byte after `\r\n`.
    pub fn next(&self) -> usize {
        self.end + 2
    }
}

/// Find the line starting at `offset`, up to the next `\r\n`.
#[inline]
pub(crate) fn read_line(buf: &[u8], offset: usize) -> Result<Option<Line>, Fault> {
    let search = &buf[offset..];
    let Some(pos) = memchr(b'\r', search) else {
        return Ok(None);
    };
    let cr = offset + pos;
    match buf.get(cr + 1) {
        None => Ok(None),
        Some(b'\n') => Ok(Some(Line { start: offset, end: cr })),
        Some(_) => Err(Fault::new(ParserErrorKind::MissingLineFeed, cr + 1)),
    }
}

/// Split an optional leading `-` from the digits of a number line.
///
/// Returns `(negative, first_digit_offset)`.
fn sign(buf: &[u8], line: Line) -> Result<(bool, usize), Fault> {
    let negative = buf.get(line.start) == Some(&b'-') && line.start < line.end;
    let digits = if negative { line.start + 1 } else { line.start };
    if digits == line.end {
        // empty line, or a sign with no digits
        return Err(Fault::new(ParserErrorKind::InvalidDigit(buf[digits]), digits));
    }
    Ok((negative, digits))
}

fn check_digits(buf: &[u8], from: usize, to: usize) -> Result<(), Fault> {
    match buf[from..to].iter().position(|b| !b.is_ascii_digit()) {
        Some(pos) => Err(Fault::new(
            ParserErrorKind::InvalidDigit(buf[from + pos]),
            from + pos,
        )),
        None => Ok(()),
    }
}

/// Accumulate digits as a negative i64 so that `i64::MIN` is representable.
///
/// Returns `None` on overflow.
fn accumulate(digits: &[u8], negative: bool) -> Option<i64> {
    let mut n: i64 = 0;
    for &b in digits {
        n = n.checked_mul(10)?.checked_sub((b - b'0') as i64)?;
    }
    if negative {
        Some(n)
    } else {
        n.checked_neg()
    }
}

/// Parse a `$` length or `*` count. Any negative value means null.
pub(crate) fn parse_length(buf: &[u8], line: Line) -> Result<Option<usize>, Fault> {
    let (negative, digits) = sign(buf, line)?;
    check_digits(buf, digits, line.end)?;
    if negative {
        return Ok(None);
    }
    // Too large for i64, or for usize on narrow targets.
    accumulate(&buf[digits..line.end], false)
        .and_then(|n| usize::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| {
            Fault::new(
                ParserErrorKind::InvalidDigit(buf[line.end - 1]),
                line.end - 1,
            )
        })
}

/// Parse a `:` integer line.
///
/// With `as_text` the exact decimal text is kept. Otherwise the value is an
/// `Integer`, unless it does not fit in an i64, in which case the text form
/// is returned so no precision is lost.
pub(crate) fn parse_integer(buf: &[u8], line: Line, as_text: bool) -> Result<RespValue, Fault> {
    let (negative, digits) = sign(buf, line)?;
    check_digits(buf, digits, line.end)?;

    if !as_text {
        if let Some(n) = accumulate(&buf[digits..line.end], negative) {
            return Ok(RespValue::Integer(n));
        }
    }

    // Only ASCII digits and an optional '-' remain at this point.
    let text = String::from_utf8_lossy(&buf[line.start..line.end]).into_owned();
    Ok(RespValue::BigNumber(text))
}

// ── Tests ──────────────────────────────────────────────────────────
