//! Transport boundary.
//!
//! A transport gives a node reliable bidirectional byte streams to peers,
//! tagged with the protocol they carry. [`Node`](crate::Node) is the only
//! caller; it layers length-framed messages on top.

use std::fmt;

use async_trait::async_trait;
use tessera_chain::PeerId;
use tessera_protocols::Protocol;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// A reliable bidirectional byte stream.
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Stream for T {}

pub type BoxStream = Box<dyn Stream>;

/// A stream opened by a remote peer.
pub struct IncomingStream {
    pub protocol: Protocol,
    pub remote: PeerId,
    pub stream: BoxStream,
}

impl fmt::Debug for IncomingStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingStream")
            .field("protocol", &self.protocol)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

/// Peer-to-peer stream transport.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// This node's peer id.
    fn local_peer(&self) -> PeerId;

    /// Open a stream to `peer` for `protocol`.
    async fn open_stream(&self, peer: &PeerId, protocol: Protocol) -> Result<BoxStream>;

    /// Next inbound stream; `None` once the transport is closed.
    async fn accept(&self) -> Option<IncomingStream>;

    /// Peers this transport can reach, excluding itself.
    async fn list_peers(&self) -> Vec<PeerId>;

    /// Stop accepting streams.
    async fn close(&self);
}
