pub mod tcp;

pub use tcp::Connection;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::resp::scratch::SharedScratchPool;
use crate::store::Store;

/// Bind the configured listen address.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let listener = TcpListener::bind(config.listen_addr()).await?;
    info!(addr = %listener.local_addr()?, "listening");
    Ok(listener)
}

/// Accept clients forever, one task per connection.
///
/// All connections share `store` and one scratch pool.
pub async fn serve(listener: TcpListener, store: Arc<Store>, config: ServerConfig) -> Result<()> {
    let scratch = SharedScratchPool::new();
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "accepted connection");
        let connection = Connection::new(stream, store.clone(), scratch.clone(), &config)?;
        tokio::spawn(async move {
            match connection.run().await {
                Ok(()) => debug!(%peer, "connection closed"),
                Err(e) => warn!(%peer, error = %e, "connection failed"),
            }
        });
    }
}
