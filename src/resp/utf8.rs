//! Streaming UTF-8 decoding for bulk strings that arrive in pieces.
//!
//! A character may be split across two fragments; the incomplete tail of one
//! fragment is carried over and completed by the next. Invalid sequences are
//! replaced with U+FFFD, matching `String::from_utf8_lossy`.

use std::str;

/// Incremental, lossy UTF-8 to `String` decoder.
#[derive(Debug, Default)]
pub struct Utf8Assembler {
    out: String,
    /// Bytes of a character that is not complete yet (at most 3).
    carry: [u8; 4],
    carry_len: usize,
}

impl Utf8Assembler {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Decode the next fragment.
    pub fn push(&mut self, mut bytes: &[u8]) {
        if self.carry_len > 0 {
            bytes = self.complete_carry(bytes);
        }
        self.decode(bytes);
    }

    /// Flush and return the decoded text.
    pub fn finish(mut self) -> String {
        if self.carry_len > 0 {
            self.out.push(char::REPLACEMENT_CHARACTER);
        }
        self.out
    }

    /// Feed bytes into the carried partial character until it either
    /// completes or proves invalid. Returns the unconsumed rest of `bytes`.
    fn complete_carry<'a>(&mut self, mut bytes: &'a [u8]) -> &'a [u8] {
        while self.carry_len > 0 {
            let Some((&b, rest)) = bytes.split_first() else {
                return bytes;
            };
            self.carry[self.carry_len] = b;
            self.carry_len += 1;
            bytes = rest;

            match str::from_utf8(&self.carry[..self.carry_len]) {
                Ok(s) => {
                    self.out.push_str(s);
                    self.carry_len = 0;
                }
                Err(e) if e.error_len().is_none() => {
                    // still incomplete, keep going
                }
                Err(e) => {
                    // The carried bytes cannot start a valid character. Emit a
                    // replacement for the invalid prefix and re-decode the rest.
                    let bad = e.valid_up_to() + e.error_len().unwrap_or(1);
                    let mut pending = [0u8; 4];
                    let rest_len = self.carry_len - bad;
                    pending[..rest_len].copy_from_slice(&self.carry[bad..self.carry_len]);
                    self.out.push(char::REPLACEMENT_CHARACTER);
                    self.carry_len = 0;
                    self.decode(&pending[..rest_len]);
                }
            }
        }
        bytes
    }

    fn decode(&mut self, mut bytes: &[u8]) {
        loop {
            match str::from_utf8(bytes) {
                Ok(s) => {
                    self.out.push_str(s);
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // SAFETY: from_utf8 validated bytes[..valid].
                    self.out
                        .push_str(unsafe { str::from_utf8_unchecked(&bytes[..valid]) });
                    match e.error_len() {
                        Some(len) => {
                            self.out.push(char::REPLACEMENT_CHARACTER);
                            bytes = &bytes[valid + len..];
                        }
                        None => {
                            let tail = &bytes[valid..];
                            self.carry[..tail.len()].copy_from_slice(tail);
                            self.carry_len = tail.len();
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Decode `fragments` as one contiguous UTF-8 string.
pub fn decode_fragments<'a, I>(fragments: I, capacity: usize) -> String
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut assembler = Utf8Assembler::with_capacity(capacity);
    for fragment in fragments {
        assembler.push(fragment);
    }
    assembler.finish()
}

// ── Tests ──────────────────────────────────────────────────────────
