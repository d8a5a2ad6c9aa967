//! One client connection of the key/value server.
//!
//! Socket reads go straight into the decoder as chunks. Whatever the decoder
//! completes during a `feed` is queued by its continuations, then dispatched,
//! and all replies produced for that read are written back in one go.

use bytes::BytesMut;
use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::{DecodeError, ParserError, Result};
use crate::resp::decoder::Decoder;
use crate::resp::scratch::SharedScratchPool;
use crate::resp::types::RespValue;
use crate::resp::writer::{encode_error, encode_value};
use crate::store::Store;

/// Something the decoder handed over during the last `feed`.
#[derive(Debug)]
enum Inbound {
    Command(RespValue),
    Rejected(DecodeError),
    Corrupted(ParserError),
}

type Inbox = Arc<Mutex<Vec<Inbound>>>;

/// A served client.
pub struct Connection {
    stream: TcpStream,
    decoder: Decoder,
    inbox: Inbox,
    store: Arc<Store>,
    buf: BytesMut,
    read_buffer: usize,
    out: Vec<u8>,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        store: Arc<Store>,
        scratch: SharedScratchPool,
        config: &ServerConfig,
    ) -> Result<Self> {
        stream.set_nodelay(true).ok();
        let inbox: Inbox = Arc::new(Mutex::new(Vec::new()));
        let (replies, errors, fatals) = (inbox.clone(), inbox.clone(), inbox.clone());
        let decoder = Decoder::builder()
            .config(config.decoder)
            .scratch_pool(scratch)
            .on_reply(move |value| replies.lock().push(Inbound::Command(value)))
            .on_protocol_error(move |err| errors.lock().push(Inbound::Rejected(err)))
            .on_fatal_error(move |err| fatals.lock().push(Inbound::Corrupted(err)))
            .build()?;

        Ok(Self {
            stream,
            decoder,
            inbox,
            store,
            buf: BytesMut::with_capacity(config.read_buffer),
            read_buffer: config.read_buffer,
            out: Vec::new(),
        })
    }

    /// Serve requests until the client disconnects or corrupts the stream.
    pub async fn run(mut self) -> Result<()> {
        loop {
            self.buf.reserve(self.read_buffer);
            let n = self.stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                if !self.decoder.is_idle() {
                    debug!("client closed mid-value");
                }
                return Ok(());
            }

            self.decoder.feed(self.buf.split().freeze());
            let keep_open = self.drain();

            if !self.out.is_empty() {
                self.stream.write_all(&self.out).await?;
                self.out.clear();
            }
            if !keep_open {
                self.stream.shutdown().await.ok();
                return Ok(());
            }
        }
    }

    /// Dispatch queued commands. Returns false once the stream is corrupt.
    fn drain(&mut self) -> bool {
        let inbound = mem::take(&mut *self.inbox.lock());
        for item in inbound {
            match item {
                Inbound::Command(command) => {
                    let reply = self.store.dispatch(command);
                    encode_value(&mut self.out, &reply);
                }
                Inbound::Rejected(err) => {
                    debug!(error = %err, "client sent an error reply as a command");
                    encode_error(&mut self.out, "ERR Protocol error: expected a command array");
                }
                Inbound::Corrupted(err) => {
                    warn!(offset = err.offset(), "closing connection: {err}");
                    encode_error(&mut self.out, "ERR Protocol error");
                    return false;
                }
            }
        }
        true
    }
}
