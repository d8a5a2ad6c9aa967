//! respfeed key/value server
//!
//! Speaks enough RESP for `SET`, `GET` and `PING`.

use clap::Parser;
use respfeed::connection;
use respfeed::{ServerConfig, Store};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "resp-server")]
#[command(about = "In-memory key/value server built on the incremental RESP decoder")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    listen: String,

    /// Full server URL, e.g. resp://0.0.0.0:5000?raw_bytes=true. Overrides --listen.
    #[arg(long)]
    url: Option<String>,

    /// Decode strings as raw bytes instead of text
    #[arg(long)]
    raw_bytes: bool,

    /// Decode integers as their exact decimal text
    #[arg(long)]
    big_numbers_as_text: bool,

    /// Bytes reserved for each socket read
    #[arg(long)]
    read_buffer: Option<usize>,
}

impl Args {
    fn server_config(&self) -> respfeed::Result<ServerConfig> {
        let url = match &self.url {
            Some(url) => url.clone(),
            None => format!("resp://{}", self.listen),
        };
        let mut config = ServerConfig::from_url(&url)?;
        if self.raw_bytes {
            config.decoder.return_raw_bytes = true;
        }
        if self.big_numbers_as_text {
            config.decoder.return_big_numbers_as_text = true;
        }
        if let Some(size) = self.read_buffer.filter(|&n| n > 0) {
            config.read_buffer = size;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    let config = match args.server_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    tracing::info!("resp-server v{}", respfeed::VERSION);
    tracing::info!(
        raw_bytes = config.decoder.return_raw_bytes,
        big_numbers_as_text = config.decoder.return_big_numbers_as_text,
        "decoder options"
    );

    let listener = match connection::bind(&config).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr(), e);
            std::process::exit(1);
        }
    };

    let store = Arc::new(Store::new());
    tokio::select! {
        result = connection::serve(listener, store, config) => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
    }
}
