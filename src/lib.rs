//! Incremental RESP decoding.
//!
//! [`Decoder`] turns an arbitrarily fragmented byte stream into complete
//! RESP values, delivered through continuations. The [`store`] and
//! [`connection`] modules wire it into a small key/value server.

pub mod config;
pub mod connection;
pub mod error;
pub mod resp;
pub mod store;

pub use config::{DecoderConfig, ServerConfig};
pub use error::{DecodeError, Error, ParserError, ParserErrorKind, ReplyError, Result};
pub use resp::{Decoder, DecoderBuilder, RespString, RespValue, SharedScratchPool};
pub use store::Store;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
