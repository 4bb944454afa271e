//! TCP listener and per-connection protocol loop.
//!
//! The wire contract is one receive, one send, then close: a connection
//! carries exactly one command. A connection that closes before sending
//! anything is dropped silently, without a command-log row.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;

/// A command token fits comfortably in a single read.
const RECV_BUFFER_SIZE: usize = 1024;

pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub async fn bind(addr: &str, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        Ok(Self {
            listener,
            dispatcher,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("listener has no local address")
    }

    /// Accept loop. Each connection runs in its own task; a failing
    /// connection never takes the listener down.
    pub async fn serve(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "listening for commands");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection accepted");
                    let dispatcher = Arc::clone(&self.dispatcher);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, dispatcher).await {
                            warn!(%peer, error = %e, "connection handling failed");
                        }
                    });
                }
                Err(e) => error!(error = %e, "failed to accept connection"),
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
) -> Result<()> {
    let mut buffer = [0u8; RECV_BUFFER_SIZE];
    let received = stream
        .read(&mut buffer)
        .await
        .context("failed to read command")?;
    if received == 0 {
        debug!(%peer, "connection closed without data");
        return Ok(());
    }

    let (response, outcome) = match std::str::from_utf8(&buffer[..received]) {
        Ok(text) => {
            let token = text.trim();
            debug!(%peer, token, "command received");
            dispatcher.dispatch(token).await
        }
        Err(e) => {
            // The token never decoded, so the log row carries an empty one.
            let outcome = dispatcher.record_failed("").await;
            (format!("Error: {e}"), outcome)
        }
    };
    debug!(%peer, ?outcome, "responding");

    // The connection is closing either way; a failed write changes nothing.
    let _ = stream
        .write_all(format!("{response}\n").as_bytes())
        .await;
    Ok(())
}
