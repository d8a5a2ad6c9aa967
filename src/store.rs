//! In-memory key/value store driven by decoded commands.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

use crate::error::ReplyError;
use crate::resp::types::{RespString, RespValue};

/// Shared string store. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<HashMap<Bytes, Bytes>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.data.read().get(key).cloned()
    }

    pub fn set(&self, key: Bytes, value: Bytes) {
        self.data.write().insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Execute one command and return its reply.
    ///
    /// A command is an array of strings whose first element names it (in any
    /// case). Supported: `PING`, `GET key`, `SET key value`.
    pub fn dispatch(&self, command: RespValue) -> RespValue {
        let Some(args) = command.into_array() else {
            return error("ERR Protocol error: expected a command array");
        };
        let mut args = match args.into_iter().map(argument).collect::<Option<Vec<_>>>() {
            Some(args) if !args.is_empty() => args.into_iter(),
            Some(_) => return error("ERR empty command"),
            None => return error("ERR Protocol error: command arguments must be strings"),
        };
        let Some(name) = args.next() else {
            return error("ERR empty command");
        };
        let rest: Vec<Bytes> = args.map(RespString::into_bytes).collect();
        trace!(command = ?String::from_utf8_lossy(name.as_bytes()), argc = rest.len(), "dispatch");

        let name = name.as_bytes();
        if name.eq_ignore_ascii_case(b"ping") {
            match rest.as_slice() {
                [] => RespValue::SimpleString("PONG".into()),
                [message] => RespValue::BulkString(message.clone().into()),
                _ => arity("ping"),
            }
        } else if name.eq_ignore_ascii_case(b"get") {
            match rest.as_slice() {
                [key] => match self.get(key) {
                    Some(value) => RespValue::BulkString(value.into()),
                    None => RespValue::Null,
                },
                _ => arity("get"),
            }
        } else if name.eq_ignore_ascii_case(b"set") {
            match <[Bytes; 2]>::try_from(rest) {
                Ok([key, value]) => {
                    self.set(key, value);
                    RespValue::SimpleString("OK".into())
                }
                Err(_) => arity("set"),
            }
        } else {
            error("ERR unknown command")
        }
    }
}

fn argument(value: RespValue) -> Option<RespString> {
    match value {
        RespValue::BulkString(s) | RespValue::SimpleString(s) => Some(s),
        _ => None,
    }
}

fn error(message: &str) -> RespValue {
    RespValue::Error(ReplyError::new(message))
}

fn arity(command: &str) -> RespValue {
    RespValue::Error(ReplyError::new(format!(
        "ERR wrong number of arguments for '{command}' command"
    )))
}
