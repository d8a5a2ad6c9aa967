//! Shared helpers for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use respfeed::{DecodeError, Decoder, DecoderConfig, ParserError, RespValue};
use std::sync::Arc;

/// Everything a decoder reported, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Reply(RespValue),
    Error(DecodeError),
    Fatal(ParserError),
}

#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    /// Build a decoder whose continuations all record into this recorder.
    pub fn decoder(&self, config: DecoderConfig) -> Decoder {
        let (r, e, f) = (self.events.clone(), self.events.clone(), self.events.clone());
        Decoder::builder()
            .config(config)
            .on_reply(move |v| r.lock().push(Event::Reply(v)))
            .on_protocol_error(move |err| e.lock().push(Event::Error(err)))
            .on_fatal_error(move |err| f.lock().push(Event::Fatal(err)))
            .build()
            .expect("all continuations supplied")
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn replies(&self) -> Vec<RespValue> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Reply(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }
}

pub fn text() -> DecoderConfig {
    DecoderConfig::default()
}

pub fn raw() -> DecoderConfig {
    DecoderConfig::builder().return_raw_bytes(true).build()
}

/// Decode `wire` fed as the given chunks and return every event.
pub fn decode_chunks(config: DecoderConfig, chunks: &[&[u8]]) -> Vec<Event> {
    let recorder = Recorder::default();
    let mut decoder = recorder.decoder(config);
    for chunk in chunks {
        decoder.feed(chunk.to_vec());
    }
    assert!(decoder.is_idle(), "decoder left partial state behind");
    recorder.events()
}
