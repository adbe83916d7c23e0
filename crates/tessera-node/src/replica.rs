//! Change-request processing for the DHT and validate protocols.
//!
//! Direct requests and gossip replays share one path, [`Replica::apply`],
//! so gossip gets the same validation and ordering a direct request does.
//! Validation packages are resolved locally first (own chain, then the
//! replica), then from the message's author, then from the fallback peer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tessera_chain::{Chain, PeerId};
use tessera_dht::Dht;
use tessera_hash::Hash;
use tessera_protocols::{
    Body, DelReq, GetReq, LinkQuery, LinkQueryResp, LinkReq, Message, ModReq, MsgType, Protocol,
    PutReq, ResponseError, ValidateQuery, ValidationPackage,
};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::node::{Node, ProtocolHandler};

/// One node's view of the replicated store.
pub struct Replica {
    dht: Arc<Dht>,
    chain: Arc<Mutex<Chain>>,
    /// Public key of the local agent, the author of every chain entry.
    author: Vec<u8>,
    node: Arc<Node>,
}

impl Replica {
    pub fn new(dht: Arc<Dht>, chain: Arc<Mutex<Chain>>, author: Vec<u8>, node: Arc<Node>) -> Self {
        Self {
            dht,
            chain,
            author,
            node,
        }
    }

    pub fn dht(&self) -> &Arc<Dht> {
        &self.dht
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    fn chain(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validation package held locally, from the own chain or the replica.
    ///
    /// Rejected entries are included: a peer replaying their puts needs the
    /// package to record the same rejection.
    pub fn local_package(&self, hash: &Hash) -> Option<ValidationPackage> {
        let own = {
            let chain = self.chain();
            chain
                .get_entry_header(hash)
                .ok()
                .map(|link| ValidationPackage {
                    entry_type: link.header.entry_type.clone(),
                    entry: link.entry.clone(),
                    header: link.header.clone(),
                    author: self.author.clone(),
                })
        };
        own.or_else(|| self.dht.package(hash))
    }

    /// Resolve the validation package for `hash`.
    pub async fn fetch_package(
        &self,
        hash: &Hash,
        validate_type: MsgType,
        author: &PeerId,
        fallback: Option<&PeerId>,
    ) -> Result<ValidationPackage> {
        if let Some(pkg) = self.local_package(hash) {
            return Ok(pkg);
        }

        let mut last_err = Error::Dht(tessera_dht::Error::HashNotFound);
        let mut asked: Vec<&PeerId> = Vec::new();
        for peer in std::iter::once(author).chain(fallback) {
            if peer.is_empty() || peer == self.node.peer_id() || asked.contains(&peer) {
                continue;
            }
            asked.push(peer);

            let query = self.node.new_message(
                validate_type,
                Body::Validate(ValidateQuery { hash: hash.clone() }),
            );
            match self.node.request(Protocol::Validate, peer, &query).await {
                Ok(Body::Package(pkg)) => {
                    trace!(hash = %hash.short(), %peer, "Package fetched");
                    return Ok(pkg);
                }
                Ok(other) => last_err = Error::UnexpectedReply(format!("{other:?}")),
                Err(e) => {
                    debug!(hash = %hash.short(), %peer, error = %e, "Package fetch failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Process one DHT request. `fallback` is asked for packages the
    /// message's author cannot supply.
    pub async fn apply(&self, msg: Message, fallback: Option<&PeerId>) -> Result<Body> {
        if !msg.body_matches_type() {
            return Err(Error::Response(ResponseError::Unknown(format!(
                "body does not match {}",
                msg.msg_type
            ))));
        }
        if msg.msg_type.is_change() && self.dht.seen(&msg.fingerprint()?) {
            trace!(msg_type = %msg.msg_type, "Change already applied");
            return Ok(Body::Empty);
        }

        match &msg.body {
            Body::Put(PutReq { hash }) => {
                let pkg = self
                    .fetch_package(hash, MsgType::ValidatePutRequest, &msg.from, fallback)
                    .await?;
                self.dht.put(&msg, hash, &pkg)?;
                Ok(Body::Empty)
            }
            Body::Del(DelReq { hash, .. }) => {
                self.dht.del(&msg, hash)?;
                Ok(Body::Empty)
            }
            Body::Mod(ModReq { hash, new_hash }) => {
                let pkg = self
                    .fetch_package(new_hash, MsgType::ValidateModRequest, &msg.from, fallback)
                    .await?;
                self.dht.modify(&msg, hash, new_hash, &pkg)?;
                Ok(Body::Empty)
            }
            Body::Link(LinkReq { base, links }) => {
                let pkg = self
                    .fetch_package(links, MsgType::ValidateLinkRequest, &msg.from, fallback)
                    .await?;
                self.dht.put_links(&msg, base, links, &pkg)?;
                Ok(Body::Empty)
            }
            Body::Get(GetReq { hash, status_mask }) => {
                Ok(Body::Record(self.dht.get(hash, *status_mask)?.to_response()))
            }
            Body::GetLink(LinkQuery {
                base,
                tag,
                status_mask,
            }) => Ok(Body::Links(LinkQueryResp {
                links: self.dht.get_links(base, tag, *status_mask)?,
            })),
            _ => Err(Error::Response(ResponseError::Unknown(format!(
                "unexpected body for {}",
                msg.msg_type
            )))),
        }
    }
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("dht", &self.dht)
            .field("peer", self.node.peer_id())
            .finish_non_exhaustive()
    }
}

/// Serves `tessera-dht`.
#[derive(Debug)]
pub struct DhtHandler {
    replica: Arc<Replica>,
}

impl DhtHandler {
    pub fn new(replica: Arc<Replica>) -> Self {
        Self { replica }
    }
}

#[async_trait]
impl ProtocolHandler for DhtHandler {
    async fn handle(&self, msg: Message) -> std::result::Result<Body, ResponseError> {
        self.replica
            .apply(msg, None)
            .await
            .map_err(|e| e.to_response_error())
    }
}

/// Serves `tessera-validate` from the local chain and replica.
#[derive(Debug)]
pub struct ValidateHandler {
    replica: Arc<Replica>,
}

impl ValidateHandler {
    pub fn new(replica: Arc<Replica>) -> Self {
        Self { replica }
    }
}

#[async_trait]
impl ProtocolHandler for ValidateHandler {
    async fn handle(&self, msg: Message) -> std::result::Result<Body, ResponseError> {
        match msg.body {
            Body::Validate(ValidateQuery { hash }) => self
                .replica
                .local_package(&hash)
                .map(Body::Package)
                .ok_or(ResponseError::HashNotFound),
            _ => Err(ResponseError::Unknown(format!(
                "unexpected body for {}",
                msg.msg_type
            ))),
        }
    }
}
