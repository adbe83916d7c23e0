//! Message dispatch over a transport.
//!
//! Every exchange is one stream carrying one request frame and one response
//! frame. Inbound requests are checked against their protocol, handed to the
//! registered [`ProtocolHandler`] and answered with OK_RESPONSE or
//! ERROR_RESPONSE.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tessera_chain::PeerId;
use tessera_protocols::{
    read_message, write_message, Body, Message, MsgType, Protocol, ResponseError,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::transport::{IncomingStream, Transport};

/// Serves one protocol.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Produce the OK_RESPONSE body for `msg`, or the error to report.
    async fn handle(&self, msg: Message) -> std::result::Result<Body, ResponseError>;
}

/// Resolve once `shutdown` reads `true`.
///
/// The borrow guard `wait_for` yields is dropped here, so a `select!` arm
/// built on this keeps the enclosing future `Send`.
pub(crate) async fn closed(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

/// A peer endpoint: sends requests and dispatches inbound ones.
pub struct Node {
    transport: Arc<dyn Transport>,
    peer: PeerId,
    send_timeout: Duration,
    handlers: RwLock<HashMap<Protocol, Arc<dyn ProtocolHandler>>>,
    shutdown: watch::Sender<bool>,
}

impl Node {
    pub fn new(transport: Arc<dyn Transport>, send_timeout: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            peer: transport.local_peer(),
            transport,
            send_timeout,
            handlers: RwLock::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Install the handler for `protocol`, replacing any previous one.
    pub fn set_handler(&self, protocol: Protocol, handler: Arc<dyn ProtocolHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(protocol, handler);
    }

    fn handler(&self, protocol: Protocol) -> Option<Arc<dyn ProtocolHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&protocol)
            .cloned()
    }

    /// A message from this node stamped with the current time.
    pub fn new_message(&self, msg_type: MsgType, body: Body) -> Message {
        Message::new(msg_type, self.peer.clone(), body)
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Receiver that flips to `true` when the node closes.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Send `msg` to `peer` and wait for its reply message.
    ///
    /// Fails with [`Error::Timeout`] after the send timeout and with
    /// [`Error::Closed`] if the node closes first. Never retries.
    pub async fn send(&self, protocol: Protocol, peer: &PeerId, msg: &Message) -> Result<Message> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return Err(Error::Closed);
        }

        let exchange = async {
            let mut stream = self.transport.open_stream(peer, protocol).await?;
            write_message(&mut stream, msg).await?;
            Ok::<_, Error>(read_message(&mut stream).await?)
        };

        trace!(%peer, protocol = protocol.name(), msg_type = %msg.msg_type, "Sending");
        tokio::select! {
            () = closed(&mut shutdown) => Err(Error::Closed),
            reply = tokio::time::timeout(self.send_timeout, exchange) => {
                reply.map_err(|_| Error::Timeout(peer.to_string()))?
            }
        }
    }

    /// Send and unwrap the reply: the OK_RESPONSE body, or the remote error.
    pub async fn request(&self, protocol: Protocol, peer: &PeerId, msg: &Message) -> Result<Body> {
        let reply = self.send(protocol, peer, msg).await?;
        match (reply.msg_type, reply.body) {
            (MsgType::OkResponse, body) => Ok(body),
            (MsgType::ErrorResponse, Body::Error(resp)) => Err(Error::Response(resp.into())),
            (other, _) => Err(Error::UnexpectedReply(other.to_string())),
        }
    }

    /// Answer one inbound request.
    pub async fn respond(&self, protocol: Protocol, msg: Message) -> Message {
        let result = match protocol.check(&msg) {
            Err(e) => Err(e),
            Ok(()) => match self.handler(protocol) {
                Some(handler) => handler.handle(msg).await,
                None => Err(ResponseError::Unknown(format!(
                    "no handler for {} protocol",
                    protocol.name()
                ))),
            },
        };
        match result {
            Ok(body) => self.new_message(MsgType::OkResponse, body),
            Err(e) => {
                debug!(protocol = protocol.name(), error = %e, "Request refused");
                self.new_message(MsgType::ErrorResponse, Body::Error(e.to_response()))
            }
        }
    }

    async fn serve(&self, incoming: IncomingStream) -> Result<()> {
        let IncomingStream {
            protocol,
            remote,
            mut stream,
        } = incoming;
        // undecodable input is a local error; the stream is dropped unanswered
        let msg = read_message(&mut stream).await?;
        trace!(%remote, protocol = protocol.name(), msg_type = %msg.msg_type, "Received");
        let reply = self.respond(protocol, msg).await;
        write_message(&mut stream, &reply).await?;
        Ok(())
    }

    /// Spawn the accept loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            info!(peer = %node.peer, "Node accepting streams");
            let mut shutdown = node.shutdown.subscribe();
            loop {
                tokio::select! {
                    () = closed(&mut shutdown) => break,
                    incoming = node.transport.accept() => match incoming {
                        Some(incoming) => {
                            let node = Arc::clone(&node);
                            tokio::spawn(async move {
                                if let Err(e) = node.serve(incoming).await {
                                    warn!(error = %e, "Stream error");
                                }
                            });
                        }
                        None => break,
                    },
                }
            }
            debug!(peer = %node.peer, "Accept loop stopped");
        })
    }

    /// Stop serving, fail in-flight sends and release the handlers.
    pub async fn close(&self) {
        self.shutdown.send_replace(true);
        self.transport.close().await;
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!(peer = %self.peer, "Node closed");
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("peer", &self.peer)
            .field("send_timeout", &self.send_timeout)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
