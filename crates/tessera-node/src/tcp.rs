//! TCP transport.
//!
//! One TCP connection per stream. The opener first writes a preamble frame
//! naming the protocol and its own peer id; after that the connection is a
//! plain byte stream. Peers are reached through an address book filled from
//! bootstrap configuration.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_chain::PeerId;
use tessera_protocols::{read_frame, write_frame, Protocol};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transport::{BoxStream, IncomingStream, Transport};

const PREAMBLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
struct Preamble {
    protocol: String,
    from: PeerId,
}

/// TCP [`Transport`].
#[derive(Debug)]
pub struct TcpTransport {
    peer: PeerId,
    local_addr: SocketAddr,
    book: Arc<RwLock<HashMap<PeerId, SocketAddr>>>,
    accept_rx: Mutex<mpsc::Receiver<IncomingStream>>,
    listener: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TcpTransport {
    /// Listen on `addr` as `peer`.
    pub async fn bind(addr: SocketAddr, peer: PeerId) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, %peer, "TCP transport listening");

        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::spawn(accept_loop(listener, tx));

        Ok(Self {
            peer,
            local_addr,
            book: Arc::new(RwLock::new(HashMap::new())),
            accept_rx: Mutex::new(rx),
            listener: std::sync::Mutex::new(Some(handle)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Record where `peer` listens.
    pub async fn add_peer(&self, peer: PeerId, addr: SocketAddr) {
        debug!(%peer, %addr, "Peer added");
        self.book.write().await.insert(peer, addr);
    }
}

async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<IncomingStream>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    match read_preamble(stream).await {
                        Ok(incoming) => {
                            let _ = tx.send(incoming).await;
                        }
                        Err(e) => warn!(%addr, error = %e, "Dropping connection"),
                    }
                });
            }
            Err(e) => warn!(error = %e, "Accept error"),
        }
    }
}

async fn read_preamble(mut stream: TcpStream) -> Result<IncomingStream> {
    let bytes = tokio::time::timeout(PREAMBLE_TIMEOUT, read_frame(&mut stream))
        .await
        .map_err(|_| Error::Transport("preamble timed out".into()))??;
    let preamble: Preamble = bincode::deserialize(&bytes)
        .map_err(|e| Error::Protocol(tessera_protocols::Error::Codec(e)))?;
    let protocol = Protocol::from_name(&preamble.protocol)
        .ok_or_else(|| Error::Transport(format!("unknown protocol {}", preamble.protocol)))?;
    Ok(IncomingStream {
        protocol,
        remote: preamble.from,
        stream: Box::new(stream),
    })
}

#[async_trait]
impl Transport for TcpTransport {
    fn local_peer(&self) -> PeerId {
        self.peer.clone()
    }

    async fn open_stream(&self, peer: &PeerId, protocol: Protocol) -> Result<BoxStream> {
        let addr = self
            .book
            .read()
            .await
            .get(peer)
            .copied()
            .ok_or_else(|| Error::Transport(format!("no address for peer {peer}")))?;
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Transport(format!("connect {addr}: {e}")))?;
        let preamble = bincode::serialize(&Preamble {
            protocol: protocol.name().to_string(),
            from: self.peer.clone(),
        })
        .map_err(|e| Error::Protocol(tessera_protocols::Error::Codec(e)))?;
        write_frame(&mut stream, &preamble).await?;
        Ok(Box::new(stream))
    }

    async fn accept(&self) -> Option<IncomingStream> {
        self.accept_rx.lock().await.recv().await
    }

    async fn list_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.book.read().await.keys().cloned().collect();
        peers.sort();
        peers
    }

    async fn close(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            info!(addr = %self.local_addr, "TCP transport closed");
        }
    }
}
