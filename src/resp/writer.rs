//! RESP serializer.
//!
//! Replies are appended to a caller-owned buffer so that everything produced
//! for one read can go out in a single `write_all`. Commands are encoded as
//! bulk string arrays: `*<N>\r\n$<len>\r\narg1\r\n$<len>\r\narg2\r\n…`

use itoa::Buffer;

use crate::resp::types::RespValue;

const CRLF: &[u8] = b"\r\n";

fn line(buf: &mut Vec<u8>, tag: u8, body: &[u8]) {
    buf.reserve(body.len() + 3);
    buf.push(tag);
    buf.extend_from_slice(body);
    buf.extend_from_slice(CRLF);
}

/// `+<text>\r\n`. The text must not contain CR or LF.
pub fn encode_simple(buf: &mut Vec<u8>, text: &[u8]) {
    line(buf, b'+', text);
}

/// `-<message>\r\n`. The message must not contain CR or LF.
pub fn encode_error(buf: &mut Vec<u8>, message: &str) {
    line(buf, b'-', message.as_bytes());
}

pub fn encode_integer(buf: &mut Vec<u8>, n: i64) {
    line(buf, b':', Buffer::new().format(n).as_bytes());
}

/// `$<len>\r\n<data>\r\n`, binary-safe.
pub fn encode_bulk(buf: &mut Vec<u8>, data: &[u8]) {
    buf.reserve(1 + 10 + 2 + data.len() + 2);
    line(buf, b'$', Buffer::new().format(data.len()).as_bytes());
    buf.extend_from_slice(data);
    buf.extend_from_slice(CRLF);
}

/// The null bulk string, `$-1\r\n`.
pub fn encode_null(buf: &mut Vec<u8>) {
    buf.extend_from_slice(b"$-1\r\n");
}

pub fn encode_array_header(buf: &mut Vec<u8>, len: usize) {
    line(buf, b'*', Buffer::new().format(len).as_bytes());
}

/// Encode any decoded value back to the wire.
///
/// Big numbers are written as `:` lines with their digits unchanged.
pub fn encode_value(buf: &mut Vec<u8>, value: &RespValue) {
    match value {
        RespValue::SimpleString(s) => encode_simple(buf, s.as_bytes()),
        RespValue::Error(e) => encode_error(buf, e.message()),
        RespValue::Integer(n) => encode_integer(buf, *n),
        RespValue::BigNumber(digits) => line(buf, b':', digits.as_bytes()),
        RespValue::BulkString(s) => encode_bulk(buf, s.as_bytes()),
        RespValue::Array(items) => {
            encode_array_header(buf, items.len());
            for item in items {
                encode_value(buf, item);
            }
        }
        RespValue::Null => encode_null(buf),
    }
}

/// Encode a command (list of arguments) into RESP wire format.
///
/// Each argument is treated as a binary-safe bulk string.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let mut cap = 1 + 10 + 2;
    for arg in args {
        cap += 1 + 10 + 2 + arg.len() + 2;
    }

    let mut buf = Vec::with_capacity(cap);
    encode_array_header(&mut buf, args.len());
    for arg in args {
        encode_bulk(&mut buf, arg);
    }
    buf
}

/// Encode a command from string arguments (convenience wrapper).
pub fn encode_command_str(args: &[&str]) -> Vec<u8> {
    let byte_args: Vec<&[u8]> = args.iter().map(|s| s.as_bytes()).collect();
    encode_command(&byte_args)
}

/// Helper macro for building commands ergonomically.
///
/// Usage:
/// ```ignore
/// let bytes = cmd!("SET", "mykey", "myvalue");
/// ```
#[macro_export]
macro_rules! cmd {
    ($($arg:expr),+ $(,)?) => {{
        $crate::resp::writer::encode_command_str(&[$($arg),+])
    }};
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplyError;
    use bytes::Bytes;

    fn encoded(f: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
        let mut buf = Vec::new();
        f(&mut buf);
        buf
    }

    #[test]
    fn reply_primitives() {
        assert_eq!(encoded(|b| encode_simple(b, b"OK")), b"+OK\r\n");
        assert_eq!(
            encoded(|b| encode_error(b, "ERR unknown command")),
            b"-ERR unknown command\r\n"
        );
        assert_eq!(encoded(|b| encode_integer(b, -42)), b":-42\r\n");
        assert_eq!(encoded(|b| encode_bulk(b, b"")), b"$0\r\n\r\n");
        assert_eq!(encoded(encode_null), b"$-1\r\n");
        assert_eq!(encoded(|b| encode_array_header(b, 3)), b"*3\r\n");
    }

    #[test]
    fn replies_append() {
        let mut buf = Vec::new();
        encode_simple(&mut buf, b"PONG");
        encode_bulk(&mut buf, b"val\r\nue");
        assert_eq!(buf, b"+PONG\r\n$7\r\nval\r\nue\r\n");
    }

    #[test]
    fn nested_value() {
        let value = RespValue::Array(vec![
            RespValue::BulkString(Bytes::from_static(b"a").into()),
            RespValue::Array(vec![RespValue::Integer(1), RespValue::Null]),
            RespValue::Error(ReplyError::new("WRONGTYPE nope")),
            RespValue::BigNumber("123456789012345678901234567890".into()),
        ]);
        assert_eq!(
            encoded(|b| encode_value(b, &value)),
            b"*4\r\n$1\r\na\r\n*2\r\n:1\r\n$-1\r\n-WRONGTYPE nope\r\n:123456789012345678901234567890\r\n"
                .to_vec()
        );
    }

    #[test]
    fn encode_two_args() {
        let result = encode_command(&[b"GET", b"mykey"]);
        assert_eq!(result, b"*2\r\n$3\r\nGET\r\n$5\r\nmykey\r\n");
    }

    #[test]
    fn encode_binary_arg() {
        let result = encode_command(&[b"SET", b"key", &[0x00, 0x01, 0xFF]]);
        let expected = b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$3\r\n\x00\x01\xFF\r\n";
        assert_eq!(result, expected.as_ref());
    }

    #[test]
    fn encode_no_args() {
        assert_eq!(encode_command(&[]), b"*0\r\n");
    }

    #[test]
    fn cmd_macro_with_variable() {
        let key = "mykey";
        let result = cmd!("GET", key);
        assert_eq!(result, b"*2\r\n$3\r\nGET\r\n$5\r\nmykey\r\n");
    }

    #[test]
    fn command_decodes_back() {
        use crate::resp::decoder::Decoder;
        use parking_lot::Mutex;
        use std::sync::Arc;

        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = out.clone();
        let mut decoder = Decoder::builder()
            .on_reply(move |v| sink.lock().push(v))
            .on_protocol_error(|e| panic!("unexpected error {e}"))
            .build()
            .unwrap();
        decoder.feed(cmd!("SET", "hello", "world"));

        assert_eq!(
            *out.lock(),
            vec![RespValue::Array(vec![
                RespValue::BulkString("SET".into()),
                RespValue::BulkString("hello".into()),
                RespValue::BulkString("world".into()),
            ])]
        );
    }
}
