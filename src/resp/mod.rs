pub mod decoder;
pub(crate) mod parser;
pub mod scratch;
pub mod types;
pub mod utf8;
pub mod writer;

pub use decoder::{Decoder, DecoderBuilder};
pub use scratch::{ScratchPool, SharedScratchPool};
pub use types::{RespString, RespValue};
pub use writer::encode_command;
