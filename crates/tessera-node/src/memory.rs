//! In-memory transport.
//!
//! Streams are `tokio::io::DuplexStream` pairs routed through a shared
//! [`MemoryNetwork`] broker. Used by tests and single-process simulations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tessera_chain::PeerId;
use tessera_protocols::Protocol;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{BoxStream, IncomingStream, Transport};

const DUPLEX_BUF_SIZE: usize = 64 * 1024;

/// Shared broker routing streams between [`MemoryTransport`]s.
#[derive(Clone, Debug, Default)]
pub struct MemoryNetwork {
    peers: Arc<Mutex<HashMap<PeerId, mpsc::Sender<IncomingStream>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new transport for `peer`.
    pub async fn join(&self, peer: PeerId) -> MemoryTransport {
        let (accept_tx, accept_rx) = mpsc::channel(64);
        self.peers.lock().await.insert(peer.clone(), accept_tx);
        MemoryTransport {
            peer,
            network: self.clone(),
            accept_rx: Arc::new(Mutex::new(accept_rx)),
        }
    }

    /// Number of attached peers.
    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }
}

/// In-memory [`Transport`].
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    peer: PeerId,
    network: MemoryNetwork,
    accept_rx: Arc<Mutex<mpsc::Receiver<IncomingStream>>>,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_peer(&self) -> PeerId {
        self.peer.clone()
    }

    async fn open_stream(&self, peer: &PeerId, protocol: Protocol) -> Result<BoxStream> {
        let accept_tx = self
            .network
            .peers
            .lock()
            .await
            .get(peer)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("peer {peer} not found in network")))?;

        let (mine, theirs) = tokio::io::duplex(DUPLEX_BUF_SIZE);
        accept_tx
            .send(IncomingStream {
                protocol,
                remote: self.peer.clone(),
                stream: Box::new(theirs),
            })
            .await
            .map_err(|_| Error::Transport(format!("peer {peer} accept channel closed")))?;
        Ok(Box::new(mine))
    }

    async fn accept(&self) -> Option<IncomingStream> {
        self.accept_rx.lock().await.recv().await
    }

    async fn list_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .network
            .peers
            .lock()
            .await
            .keys()
            .filter(|p| **p != self.peer)
            .cloned()
            .collect();
        peers.sort();
        peers
    }

    async fn close(&self) {
        // dropping the broker's sender ends `accept` once in-flight opens finish
        self.network.peers.lock().await.remove(&self.peer);
        debug!(peer = %self.peer, "Memory transport closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn streams_connect_peers() {
        let net = MemoryNetwork::new();
        let a = net.join(PeerId::from("a")).await;
        let b = net.join(PeerId::from("b")).await;

        let mut out = a.open_stream(&PeerId::from("b"), Protocol::Gossip).await.unwrap();
        let mut incoming = b.accept().await.unwrap();
        assert_eq!(incoming.protocol, Protocol::Gossip);
        assert_eq!(incoming.remote, PeerId::from("a"));

        out.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        incoming.stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        assert_eq!(a.list_peers().await, vec![PeerId::from("b")]);
    }

    #[tokio::test]
    async fn unknown_peer_fails() {
        let net = MemoryNetwork::new();
        let a = net.join(PeerId::from("a")).await;
        let err = a.open_stream(&PeerId::from("zz"), Protocol::Dht).await.err().unwrap();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn close_ends_accept() {
        let net = MemoryNetwork::new();
        let a = net.join(PeerId::from("a")).await;
        a.close().await;
        assert!(a.accept().await.is_none());
        assert_eq!(net.len().await, 0);
    }
}
